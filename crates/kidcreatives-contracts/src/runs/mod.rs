pub mod receipts;
pub mod trophy;
