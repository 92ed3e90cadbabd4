//! Scriptable module runtime for tests.

use std::sync::{Arc, Mutex, MutexGuard};

use super::error::{ModuleError, ModuleResult};
use super::runtime::{ModuleContext, ModuleRuntime};
use crate::options::ModuleOptions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Load,
    SoftUnload,
    HardUnload,
}

#[derive(Debug)]
struct FakeState {
    loaded: bool,
    fail_load: bool,
    soft_ok: bool,
    hard_ok: bool,
    calls: Vec<Call>,
    last_options: Option<ModuleOptions>,
}

/// A module whose outcomes are set through a [`FakeHandle`].
pub(crate) struct FakeModule {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Clone)]
pub(crate) struct FakeHandle {
    state: Arc<Mutex<FakeState>>,
}

impl FakeModule {
    pub(crate) fn new() -> (Self, FakeHandle) {
        let state = Arc::new(Mutex::new(FakeState {
            loaded: false,
            fail_load: false,
            soft_ok: true,
            hard_ok: true,
            calls: Vec::new(),
            last_options: None,
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            FakeHandle { state },
        )
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

impl ModuleRuntime for FakeModule {
    fn load(&mut self, ctx: &ModuleContext<'_>) -> ModuleResult<()> {
        let mut state = self.state();
        state.calls.push(Call::Load);
        if state.fail_load {
            return Err(ModuleError::LoadFailed {
                module: ctx.name.to_string(),
                message: "scripted failure".to_string(),
            });
        }
        state.loaded = true;
        state.last_options = Some(ctx.options.clone());
        Ok(())
    }

    fn soft_unload(&mut self) -> bool {
        let mut state = self.state();
        state.calls.push(Call::SoftUnload);
        if state.soft_ok {
            state.loaded = false;
        }
        state.soft_ok
    }

    fn hard_unload(&mut self) -> bool {
        let mut state = self.state();
        state.calls.push(Call::HardUnload);
        if state.hard_ok {
            state.loaded = false;
        }
        state.hard_ok
    }

    fn is_loaded(&self) -> bool {
        self.state().loaded
    }
}

impl FakeHandle {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.state().loaded
    }

    pub(crate) fn set_loaded(&self, loaded: bool) {
        self.state().loaded = loaded;
    }

    pub(crate) fn fail_load(&self, fail: bool) {
        self.state().fail_load = fail;
    }

    pub(crate) fn soft_unload_ok(&self, ok: bool) {
        self.state().soft_ok = ok;
    }

    pub(crate) fn hard_unload_ok(&self, ok: bool) {
        self.state().hard_ok = ok;
    }

    pub(crate) fn last_options(&self) -> Option<ModuleOptions> {
        self.state().last_options.clone()
    }
}
