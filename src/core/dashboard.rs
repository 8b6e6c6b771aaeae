//! Read models for the kanban board and the KPI dashboard.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::pipeline::{LeadStatus, ProspectStatus};
use crate::core::store::types::{Lead, Prospect};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineColumn {
    pub status: ProspectStatus,
    pub count: usize,
    pub total_expected_value: f64,
    pub prospects: Vec<Prospect>,
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One column per status in pipeline order, cards by descending score.
pub fn pipeline_board(prospects: Vec<Prospect>) -> Vec<PipelineColumn> {
    let mut columns: Vec<PipelineColumn> = ProspectStatus::ALL
        .into_iter()
        .map(|status| PipelineColumn {
            status,
            count: 0,
            total_expected_value: 0.0,
            prospects: Vec::new(),
        })
        .collect();

    for prospect in prospects {
        if let Some(column) = columns
            .iter_mut()
            .find(|c| c.status == prospect.fields.status)
        {
            column.prospects.push(prospect);
        }
    }

    for column in &mut columns {
        column
            .prospects
            .sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.fields.name.cmp(&b.fields.name)));
        column.count = column.prospects.len();
        column.total_expected_value =
            round_cents(column.prospects.iter().map(|p| p.expected_value).sum());
    }
    columns
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardKpis {
    pub total_prospects: usize,
    /// Keyed by status label, every status present.
    pub by_status: BTreeMap<String, usize>,
    pub average_score: f64,
    pub pipeline_value: f64,
    pub won: usize,
    pub lost: usize,
    /// won / (won + lost), 0 when nothing is closed.
    pub conversion_rate: f64,
    pub upcoming_appointments: usize,
    pub new_leads: usize,
    pub unread_notifications: i64,
}

pub fn dashboard_kpis(
    prospects: &[Prospect],
    leads: &[Lead],
    upcoming_appointments: usize,
    unread_notifications: i64,
) -> DashboardKpis {
    let mut by_status: BTreeMap<String, usize> = ProspectStatus::ALL
        .into_iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    for p in prospects {
        *by_status
            .entry(p.fields.status.as_str().to_string())
            .or_default() += 1;
    }

    let count_status = |status: ProspectStatus| {
        prospects
            .iter()
            .filter(|p| p.fields.status == status)
            .count()
    };
    let won = count_status(ProspectStatus::Won);
    let lost = count_status(ProspectStatus::Lost);
    let conversion_rate = if won + lost == 0 {
        0.0
    } else {
        won as f64 / (won + lost) as f64
    };
    let average_score = if prospects.is_empty() {
        0.0
    } else {
        let total: i64 = prospects.iter().map(|p| p.score).sum();
        ((total as f64 / prospects.len() as f64) * 10.0).round() / 10.0
    };

    DashboardKpis {
        total_prospects: prospects.len(),
        by_status,
        average_score,
        pipeline_value: round_cents(prospects.iter().map(|p| p.expected_value).sum()),
        won,
        lost,
        conversion_rate,
        upcoming_appointments,
        new_leads: leads.iter().filter(|l| l.status == LeadStatus::New).count(),
        unread_notifications,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::types::ProspectFields;

    fn prospect(name: &str, status: ProspectStatus, score: i64, value: f64) -> Prospect {
        Prospect {
            id: name.to_string(),
            agent_id: "u1".to_string(),
            fields: ProspectFields {
                name: name.to_string(),
                status,
                ..Default::default()
            },
            score,
            expected_value: value,
            created_at: "2026-03-10T09:00:00Z".to_string(),
            updated_at: "2026-03-10T09:00:00Z".to_string(),
            last_contact: None,
        }
    }

    #[test]
    fn board_groups_by_status_and_sorts_by_score() {
        let board = pipeline_board(vec![
            prospect("a", ProspectStatus::Qualified, 60, 1000.0),
            prospect("b", ProspectStatus::Qualified, 80, 3200.0),
            prospect("c", ProspectStatus::New, 50, 0.1),
        ]);
        assert_eq!(board.len(), 7);
        assert_eq!(board[0].status, ProspectStatus::New);
        assert_eq!(board[0].count, 1);

        let qualified = &board[2];
        assert_eq!(qualified.status, ProspectStatus::Qualified);
        assert_eq!(
            qualified.prospects.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec!["b", "a"]
        );
        assert_eq!(qualified.total_expected_value, 4200.0);
        assert!(board[6].prospects.is_empty());
    }

    #[test]
    fn kpis_handle_empty_and_closed_pipelines() {
        let empty = dashboard_kpis(&[], &[], 0, 0);
        assert_eq!(empty.conversion_rate, 0.0);
        assert_eq!(empty.average_score, 0.0);
        assert_eq!(empty.by_status.len(), 7);

        let prospects = vec![
            prospect("a", ProspectStatus::Won, 90, 8000.0),
            prospect("b", ProspectStatus::Lost, 10, 0.0),
            prospect("c", ProspectStatus::Lost, 15, 0.0),
            prospect("d", ProspectStatus::Contacted, 55, 320.0),
        ];
        let kpis = dashboard_kpis(&prospects, &[], 2, 3);
        assert_eq!(kpis.total_prospects, 4);
        assert_eq!(kpis.won, 1);
        assert_eq!(kpis.lost, 2);
        assert!((kpis.conversion_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(kpis.average_score, 42.5);
        assert_eq!(kpis.pipeline_value, 8320.0);
        assert_eq!(kpis.by_status["Perdu"], 2);
        assert_eq!(kpis.upcoming_appointments, 2);
        assert_eq!(kpis.unread_notifications, 3);
    }
}
