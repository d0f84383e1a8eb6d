#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cnrm_models::{ResourceDescriptor, ResourceKind};
use cnrm_wait::store::{
    ChangeStream, MemoryStore, ObjectSnapshot, ResourceStore, StoreResult,
};
use cnrm_wait::watch::WatchSettings;
use cnrm_wait::{GroupRegistry, ProgressPrinter, report::Palette};
use rand::Rng;

pub const UNO: &str = "test-deployments-mysql-uno";
pub const DOS: &str = "test-deployments-mysql-dos";

// DNS-1123 safe numeric suffix for unique names
pub fn uniq(prefix: &str) -> String {
    let n: u32 = rand::rng().random_range(100_000..1_000_000);
    format!("{prefix}-{n}")
}

// Env guard utilities
pub struct EnvGuard {
    key: &'static str,
    old: Option<String>,
}
impl Drop for EnvGuard {
    fn drop(&mut self) {
        unsafe {
            if let Some(ref v) = self.old {
                std::env::set_var(self.key, v);
            } else {
                std::env::remove_var(self.key);
            }
        }
    }
}
pub fn set_env(key: &'static str, val: &str) -> EnvGuard {
    let old = std::env::var(key).ok();
    unsafe {
        std::env::set_var(key, val);
    }
    EnvGuard { key, old }
}

/// Cloneable writer capturing progress output.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn printer(&self) -> ProgressPrinter {
        ProgressPrinter::new(Box::new(self.clone()), Palette::PLAIN)
    }

    pub fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn settings(timeout: Duration) -> WatchSettings {
    WatchSettings {
        namespace: "sql".into(),
        timeout,
        ..Default::default()
    }
}

/// One instance with one database and one user.
pub fn single_group(instance: &str) -> GroupRegistry {
    GroupRegistry::from_descriptors(vec![
        ResourceDescriptor::instance(instance),
        ResourceDescriptor::database(format!("{instance}-db"), instance),
        ResourceDescriptor::user(format!("{instance}-user"), instance),
    ])
    .unwrap()
}

/// Store whose `get` panics for one kind and defers to a `MemoryStore`
/// for everything else.
pub struct PanickingStore {
    pub kind: ResourceKind,
    pub inner: MemoryStore,
}

#[async_trait]
impl ResourceStore for PanickingStore {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> StoreResult<ObjectSnapshot> {
        if kind == self.kind {
            panic!("store blew up reading {name}");
        }
        self.inner.get(kind, namespace, name).await
    }

    async fn subscribe(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        from_version: &str,
    ) -> StoreResult<ChangeStream> {
        self.inner.subscribe(kind, namespace, name, from_version).await
    }
}
