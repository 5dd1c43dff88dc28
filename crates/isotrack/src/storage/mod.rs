pub mod restore;
pub mod transfer;

pub use restore::{restore_matching, RestoreReport};
pub use transfer::{temp_path_for, verified_move};
