//! Domain entities and request bodies. The rules that govern them (submission lifecycle,
//! enrollment) live as methods on the entities so they can be exercised without a database.

pub mod assignment;
pub mod course;
pub mod discussion;
pub mod material;
pub mod request;
pub mod role;
pub mod user;
