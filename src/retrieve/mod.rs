//! Query-time retrieval: activation, propagation, ranking, and the dense
//! baseline.

pub mod activation;
pub mod dense;
pub mod propagation;
pub mod ranker;
