pub mod history;
pub mod model;
pub mod scores;
pub mod weather;

pub use history::*;
pub use model::*;
pub use scores::*;
pub use weather::*;
