pub(crate) mod backend;
pub(crate) mod battlefield;
pub(crate) mod bootstrap;
pub(crate) mod loop_runner;
pub(crate) mod terrain;
