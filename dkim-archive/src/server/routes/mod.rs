pub mod batch_update;
pub mod root;
