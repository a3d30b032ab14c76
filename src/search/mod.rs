pub mod context;
pub mod eval;
pub mod ordering;
pub mod picker;
pub mod pst;
pub mod search;
pub mod see;
pub mod tt;

pub use search::{Bound, Search, TimeManager, alpha_beta, format_score, quiescence};
