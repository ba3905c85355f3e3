//! HTTP ingress: the request/response surface for external submitters and
//! readers

pub mod handlers;
pub mod routes;

pub use handlers::ApiState;
pub use routes::create_router;
