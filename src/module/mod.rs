//! Metric modules: one incremental collector per metric family.
//!
//! Every module implements [`Module`]. Construction happens through a
//! [`ModuleDescriptor`], whose `create` function probes the data source once
//! and returns [`SysmonError::NotSupported`] when the host lacks it (no
//! battery, no procfs). The engine turns that outcome into a disabled module;
//! any other creation error aborts engine construction.
//!
//! Resources a module owns are released by `Drop`.

pub mod battery;
pub mod cpu;
pub mod network;
pub mod ram;
pub mod storage;

pub use battery::BatteryModule;
pub use cpu::CpuModule;
pub use network::NetworkModule;
pub use ram::RamModule;
pub use storage::StorageModule;

use std::io;
use std::path::{Path, PathBuf};

use crate::collector::FileSystem;
use crate::collector::procfs::ParseError;
use crate::config::{ConfigSource, EngineOptions, module_section};
use crate::error::{Result, SysmonError};
use crate::snapshot::SnapshotBuilder;

/// A live metric collector owned by the engine.
pub trait Module: Send {
    /// Namespace of every metric this module emits.
    fn name(&self) -> &'static str;

    /// Emits the module's full metric set into `builder`.
    ///
    /// When `refresh_due` is true, or no sample has been taken yet, the
    /// underlying counters are re-read and derived values recomputed;
    /// otherwise the cached values are emitted again unchanged.
    fn poll(&mut self, now_ms: u64, refresh_due: bool, builder: &mut SnapshotBuilder)
    -> Result<()>;
}

/// Everything a module may consult while it is being created.
pub struct ModuleContext<'a, F> {
    pub name: &'a str,
    pub config: &'a dyn ConfigSource,
    pub fs: &'a F,
    pub options: &'a EngineOptions,
    section: String,
}

impl<'a, F: FileSystem> ModuleContext<'a, F> {
    pub fn new(
        name: &'a str,
        config: &'a dyn ConfigSource,
        fs: &'a F,
        options: &'a EngineOptions,
    ) -> Self {
        Self {
            name,
            config,
            fs,
            options,
            section: module_section(name),
        }
    }

    /// Configuration section of this module, e.g. `module.network`.
    pub fn section(&self) -> &str {
        &self.section
    }

    /// Module-specific option; empty values are treated as absent.
    pub fn option(&self, key: &str) -> Option<&'a str> {
        self.config
            .get(&self.section, key)
            .filter(|v| !v.is_empty())
    }

    pub fn option_bool(&self, key: &str, default: bool) -> bool {
        self.config.get_bool(&self.section, key, default)
    }

    /// Path below the procfs root.
    pub fn proc_path(&self, relative: &str) -> PathBuf {
        Path::new(&self.options.proc_path).join(relative)
    }

    /// Path below the sysfs root.
    pub fn sys_path(&self, relative: &str) -> PathBuf {
        Path::new(&self.options.sys_path).join(relative)
    }
}

/// Constructor signature stored in a [`ModuleDescriptor`].
pub type CreateFn<F> = fn(&ModuleContext<'_, F>) -> Result<Box<dyn Module>>;

/// Static description of a module variant: its name and how to create it.
pub struct ModuleDescriptor<F> {
    pub name: &'static str,
    pub create: CreateFn<F>,
}

impl<F> ModuleDescriptor<F> {
    pub fn new(name: &'static str, create: CreateFn<F>) -> Self {
        Self { name, create }
    }
}

impl<F> Clone for ModuleDescriptor<F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F> Copy for ModuleDescriptor<F> {}

/// Built-in modules in registration order.
pub fn builtin_registry<F>() -> Vec<ModuleDescriptor<F>>
where
    F: FileSystem + Clone + 'static,
{
    vec![
        ModuleDescriptor::new(cpu::NAME, create_boxed::<F, CpuModule<F>>),
        ModuleDescriptor::new(ram::NAME, create_boxed::<F, RamModule<F>>),
        ModuleDescriptor::new(battery::NAME, create_boxed::<F, BatteryModule<F>>),
        ModuleDescriptor::new(network::NAME, create_boxed::<F, NetworkModule<F>>),
        ModuleDescriptor::new(storage::NAME, create_boxed::<F, StorageModule<F>>),
    ]
}

/// Implemented by every built-in module so the registry can box it.
pub trait CreateModule<F>: Module + Sized + 'static {
    fn create(ctx: &ModuleContext<'_, F>) -> Result<Self>;
}

fn create_boxed<F, M>(ctx: &ModuleContext<'_, F>) -> Result<Box<dyn Module>>
where
    M: CreateModule<F>,
{
    Ok(Box::new(M::create(ctx)?))
}

/// Reads a whole file, mapping failures to a transient `Io` error.
pub(crate) fn read_source<F: FileSystem>(fs: &F, path: &Path) -> Result<String> {
    fs.read_to_string(path)
        .map_err(|e| SysmonError::io(format!("failed to read {}", path.display()), e))
}

pub(crate) fn parse_failure(path: &Path, e: ParseError) -> SysmonError {
    SysmonError::parse(format!("{}: {}", path.display(), e.message))
}

/// Converts a creation-time probe failure into `NotSupported`.
pub(crate) fn unsupported(err: SysmonError) -> SysmonError {
    match err {
        SysmonError::NotSupported(_) | SysmonError::OutOfMemory(_) => err,
        other => SysmonError::not_supported(other.to_string()),
    }
}

pub(crate) fn missing(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, msg)
}
