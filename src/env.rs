use std::path::PathBuf;
use std::{cell::RefCell, ffi::OsStr};

/// Backing file name, relative to the home directory.
const DEFAULT_DISK_NAME: &str = ".debug86.img";

#[derive(Clone)]
struct Env {
    trace_enabled: bool,
    disk_path: Option<PathBuf>,
    home: Option<PathBuf>,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

pub fn init() {
    let value = Env {
        trace_enabled: var_is("DEBUG86_TRACE", "1"),
        disk_path: std::env::var_os("DEBUG86_DISK").map(PathBuf::from),
        home: std::env::var_os("HOME").map(PathBuf::from),
    };
    set_env(value);
}

/// Whether sessions start with instruction tracing on.
pub fn is_trace_enabled() -> bool {
    with_env(|env| env.trace_enabled)
}

/// Backing file used when none is given on the command line.
pub fn default_disk_path() -> PathBuf {
    with_env(|env| {
        if let Some(path) = &env.disk_path {
            return path.clone();
        }
        match &env.home {
            Some(home) => home.join(DEFAULT_DISK_NAME),
            None => PathBuf::from(DEFAULT_DISK_NAME),
        }
    })
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.as_ref().unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(env)
    })
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v == value.as_ref())
}
