pub mod ics;
pub mod links;
pub mod prospects_csv;
