//! In-memory fakes for [`CommandRunner`] (testing only)
//!
//! [`FakeRunner`] never spawns anything. It keeps a set of "installed"
//! programs, records every executed command and lets tests script failures
//! and side effects keyed on a substring of the rendered command line.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::process::{CommandRunner, CommandSpec};
use crate::Result;

type Hook = Arc<dyn Fn(&CommandSpec) + Send + Sync>;

#[derive(Default)]
struct FakeState {
    present: HashSet<String>,
    broken: HashSet<String>,
    /// Programs only reachable when the given dir is on the search path.
    hidden: HashMap<String, PathBuf>,
    provides: Vec<(String, Vec<String>, Option<PathBuf>)>,
    failures: Vec<(String, i32)>,
    executed: Vec<CommandSpec>,
    probed: Vec<CommandSpec>,
}

/// Recording [`CommandRunner`] with a scripted host.
#[derive(Default)]
pub struct FakeRunner {
    state: Mutex<FakeState>,
    hooks: Mutex<Vec<(String, Hook)>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host where the given programs are installed and working.
    pub fn with_programs<I, S>(programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let runner = Self::new();
        {
            let mut state = runner.state.lock().unwrap();
            state.present.extend(programs.into_iter().map(Into::into));
        }
        runner
    }

    /// Program exists but its `--version` (or any probe) fails.
    pub fn break_program(&self, program: &str) {
        self.state.lock().unwrap().broken.insert(program.to_string());
    }

    /// Running a command containing `pattern` installs `program` on `PATH`.
    pub fn on_command(&self, pattern: &str, program: &str) {
        self.state.lock().unwrap().provides.push((
            pattern.to_string(),
            vec![program.to_string()],
            None,
        ));
    }

    /// Running a command containing `pattern` installs `programs` into `dir`,
    /// which is not on the inherited `PATH`.
    pub fn on_command_hidden(&self, pattern: &str, programs: &[&str], dir: &PathBuf) {
        self.state.lock().unwrap().provides.push((
            pattern.to_string(),
            programs.iter().map(|p| p.to_string()).collect(),
            Some(dir.clone()),
        ));
    }

    /// Commands containing `pattern` exit with `code` (and skip their effects).
    pub fn fail_command(&self, pattern: &str, code: i32) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((pattern.to_string(), code));
    }

    /// Run `hook` whenever a command containing `pattern` succeeds.
    pub fn hook(&self, pattern: &str, hook: impl Fn(&CommandSpec) + Send + Sync + 'static) {
        self.hooks
            .lock()
            .unwrap()
            .push((pattern.to_string(), Arc::new(hook)));
    }

    /// Rendered command lines passed to `status`, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed_specs().iter().map(|c| c.to_string()).collect()
    }

    pub fn executed_specs(&self) -> Vec<CommandSpec> {
        self.state.lock().unwrap().executed.clone()
    }

    /// Rendered command lines passed to `probe`, in order.
    pub fn probed(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .probed
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    fn visible(state: &FakeState, program: &str, search: &[PathBuf]) -> Option<PathBuf> {
        if state.present.contains(program) {
            return Some(PathBuf::from("/usr/bin").join(program));
        }
        state
            .hidden
            .get(program)
            .filter(|dir| search.contains(*dir))
            .map(|dir| dir.join(program))
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn status(&self, cmd: &CommandSpec) -> Result<i32> {
        let line = cmd.to_string();
        {
            let mut state = self.state.lock().unwrap();
            state.executed.push(cmd.clone());

            if let Some((_, code)) = state.failures.iter().find(|(p, _)| line.contains(p)) {
                return Ok(*code);
            }

            let provided: Vec<_> = state
                .provides
                .iter()
                .filter(|(p, _, _)| line.contains(p))
                .map(|(_, programs, dir)| (programs.clone(), dir.clone()))
                .collect();
            for (programs, dir) in provided {
                for program in programs {
                    state.broken.remove(&program);
                    match &dir {
                        Some(dir) => {
                            state.hidden.insert(program, dir.clone());
                        }
                        None => {
                            state.present.insert(program);
                        }
                    }
                }
            }
        }

        let hooks: Vec<Hook> = self
            .hooks
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| line.contains(p))
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for hook in hooks {
            hook(cmd);
        }

        Ok(0)
    }

    async fn probe(&self, cmd: &CommandSpec) -> bool {
        let line = cmd.to_string();
        let mut state = self.state.lock().unwrap();
        state.probed.push(cmd.clone());

        if state.failures.iter().any(|(p, _)| line.contains(p)) {
            return false;
        }
        let name = cmd.program_name();
        if state.broken.contains(name) {
            return false;
        }
        Self::visible(&state, name, &cmd.path_prepend).is_some()
    }

    fn locate(&self, program: &str, extra: &[PathBuf]) -> Option<PathBuf> {
        let state = self.state.lock().unwrap();
        Self::visible(&state, program, extra)
    }
}
