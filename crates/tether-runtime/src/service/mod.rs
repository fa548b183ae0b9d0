mod builder;
mod launcher;
mod periodic;
mod runtime;
mod settings;

pub use builder::{ManagerFactory, ManagerRegistry, ServiceBuilder};
pub use launcher::Launcher;
pub use periodic::PeriodicTaskAction;
pub use runtime::{ServiceRuntime, ServiceState};
pub use settings::ServiceSettings;
