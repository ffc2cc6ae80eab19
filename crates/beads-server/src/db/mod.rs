mod store;

pub use store::BeadStore;
