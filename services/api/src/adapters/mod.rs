pub mod db;
pub mod identity;

pub use db::DbAdapter;
pub use identity::GoTrueIdentityAdapter;
