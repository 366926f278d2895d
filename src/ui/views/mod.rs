pub mod chart;
pub mod form;
pub mod ledger;
pub mod summary;
