pub mod decomposition;
pub mod eigen;
mod matrix;
pub mod solve;

pub use decomposition::*;
pub use eigen::*;
pub use solve::*;
