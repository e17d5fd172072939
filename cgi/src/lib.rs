//! CGI front end for the statekeeper session demo.
//!
//! One process serves one request: [`request`] reads the CGI environment and
//! body, [`handler`] drives the session store for the requested action, and
//! [`render`] produces the headers and HTML page.

pub mod handler;
pub mod render;
pub mod request;

pub use handler::handle;
pub use render::Response;
pub use request::{Action, CgiRequest};
