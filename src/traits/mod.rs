pub mod handler;

pub use handler::RequestHandler;
