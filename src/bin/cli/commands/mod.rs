pub mod due;
pub mod location;
pub mod preview;
pub mod register;
pub mod review;
pub mod stats;
pub mod sync;
