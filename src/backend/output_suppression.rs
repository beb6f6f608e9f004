//! Console silencing for native solvers that print to stdout
//!
//! `gag` allows a single redirect per stream per process, so guards share
//! one [`Gag`] through a weak slot: the redirect lives while at least one
//! [`Silenced`] guard does.

use std::io;
use std::sync::{Arc, Mutex, Weak};

use gag::Gag;

/// Keeps a stream silenced while alive.
pub struct Silenced {
    _gag: Arc<Gag>,
}

impl Silenced {
    pub fn stdout() -> io::Result<Self> {
        STDOUT.acquire()
    }

    pub fn stderr() -> io::Result<Self> {
        STDERR.acquire()
    }
}

struct Slot {
    current: Mutex<Weak<Gag>>,
    open: fn() -> io::Result<Gag>,
}

impl Slot {
    const fn new(open: fn() -> io::Result<Gag>) -> Self {
        Self {
            current: Mutex::new(Weak::new()),
            open,
        }
    }

    fn acquire(&self) -> io::Result<Silenced> {
        let mut current = self
            .current
            .lock()
            .map_err(|_| io::Error::other("console redirect lock poisoned"))?;

        if let Some(gag) = current.upgrade() {
            return Ok(Silenced { _gag: gag });
        }

        let gag = Arc::new((self.open)()?);
        *current = Arc::downgrade(&gag);
        Ok(Silenced { _gag: gag })
    }
}

static STDOUT: Slot = Slot::new(Gag::stdout);
static STDERR: Slot = Slot::new(Gag::stderr);
