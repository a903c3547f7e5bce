pub mod energy;
pub mod normalize;
pub mod parse;
pub mod process;
pub mod sync;
