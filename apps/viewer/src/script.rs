use std::path::PathBuf;

use neoframe_core::{
    EngineError, EngineResult, FaultFlag, Module, ModuleBuilder, ModuleCtx, PlatformState,
    Resources,
};
use neoframe_render_vulkan_ash::GpuContext;

/// One timed action of a viewer script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptAction {
    Log(String),
    Clear([f32; 4]),
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptCommand {
    pub at: f32,
    pub action: ScriptAction,
}

/// Parses the line format `at <seconds> <action>`.
///
/// Actions: `log <text>`, `clear <r> <g> <b> [a]`, `quit`. Blank lines and `#` comments are
/// skipped. Commands come back sorted by time, file order kept for equal times.
pub fn parse_script(src: &str) -> EngineResult<Vec<ScriptCommand>> {
    let mut out = Vec::new();

    for (n, raw) in src.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let bad = |msg: &str| EngineError::Config(format!("script line {}: {msg}", n + 1));

        let mut words = line.split_whitespace();
        if words.next() != Some("at") {
            return Err(bad("expected 'at <seconds> <action>'"));
        }

        let at = words
            .next()
            .and_then(|w| w.parse::<f32>().ok())
            .filter(|t| t.is_finite() && *t >= 0.0)
            .ok_or_else(|| bad("time must be a non-negative number"))?;

        let action = match words.next() {
            Some("log") => ScriptAction::Log(words.collect::<Vec<_>>().join(" ")),
            Some("quit") => ScriptAction::Quit,
            Some("clear") => {
                let parts: Vec<f32> = words
                    .map(|w| w.parse::<f32>())
                    .collect::<Result<_, _>>()
                    .map_err(|_| bad("clear expects numbers"))?;
                match parts[..] {
                    [r, g, b] => ScriptAction::Clear([r, g, b, 1.0]),
                    [r, g, b, a] => ScriptAction::Clear([r, g, b, a]),
                    _ => return Err(bad("clear expects 3 or 4 components")),
                }
            }
            Some(other) => return Err(bad(&format!("unknown action '{other}'"))),
            None => return Err(bad("missing action")),
        };

        out.push(ScriptCommand { at, action });
    }

    out.sort_by(|a, b| a.at.total_cmp(&b.at));
    Ok(out)
}

/// Script runtime block.
#[derive(Debug, Default)]
pub struct ScriptState {
    pub fault: FaultFlag,
    pub loaded: bool,
    pub elapsed: f32,
    commands: Vec<ScriptCommand>,
    next: usize,
}

impl ScriptState {
    fn load(&mut self, commands: Vec<ScriptCommand>) {
        self.commands = commands;
        self.next = 0;
        self.elapsed = 0.0;
        self.loaded = true;
    }

    /// Advances the script clock and returns the commands that became due.
    pub fn advance(&mut self, dt: f32) -> Vec<ScriptCommand> {
        self.elapsed += dt;

        let start = self.next;
        while self
            .commands
            .get(self.next)
            .is_some_and(|c| c.at <= self.elapsed)
        {
            self.next += 1;
        }
        self.commands[start..self.next].to_vec()
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.commands.len()
    }
}

#[derive(Debug, Clone)]
enum ScriptSource {
    None,
    File(PathBuf),
    Inline(String),
}

impl ScriptSource {
    fn read(&self) -> Option<Result<String, String>> {
        match self {
            ScriptSource::None => None,
            ScriptSource::File(p) => Some(
                std::fs::read_to_string(p).map_err(|e| format!("read {}: {e}", p.display())),
            ),
            ScriptSource::Inline(s) => Some(Ok(s.clone())),
        }
    }
}

/// Timed command script.
///
/// The logic-update task is registered disabled and only switched on by the
/// module-setup task once the script parsed.
pub struct ScriptModule {
    source: ScriptSource,
}

impl ScriptModule {
    pub fn from_path(path: Option<PathBuf>) -> Self {
        Self {
            source: path.map_or(ScriptSource::None, ScriptSource::File),
        }
    }

    pub fn inline(src: impl Into<String>) -> Self {
        Self {
            source: ScriptSource::Inline(src.into()),
        }
    }
}

impl Module for ScriptModule {
    fn name(&self) -> &'static str {
        "script"
    }

    fn build(self: Box<Self>, b: &mut ModuleBuilder<'_>) -> EngineResult<()> {
        let phases = *b.phases();

        let update = b.frame_task_disabled(phases.frame.logic_update, |ctx: &mut ModuleCtx<'_>| {
            let dt = ctx.dt();
            let state = ctx.resources_mut().get_or_create::<ScriptState>();
            if state.fault.is_raised() {
                return Ok(());
            }

            let due = state.advance(dt);
            for cmd in due {
                run_action(ctx.resources_mut(), cmd.action);
            }
            Ok(())
        })?;

        let source = self.source;
        b.setup_task(phases.setup.module_setup, move |ctx: &mut ModuleCtx<'_>| {
            let state = ctx.resources_mut().get_or_create::<ScriptState>();

            let Some(text) = source.read() else {
                log::info!("script: none configured");
                return Ok(());
            };

            match text.and_then(|t| parse_script(&t).map_err(|e| e.to_string())) {
                Ok(commands) => {
                    log::info!("script: loaded {} commands", commands.len());
                    state.load(commands);
                    update.enable();
                }
                Err(e) => state.fault.raise(format!("script: {e}")),
            }
            Ok(())
        })?;

        b.on_cleanup(|res: &mut Resources| {
            if let Some(s) = res.try_get_mut::<ScriptState>() {
                if s.loaded && !s.is_finished() {
                    log::debug!("script: {} commands never ran", s.commands.len() - s.next);
                }
                s.commands.clear();
                s.loaded = false;
            }
        })
    }
}

fn run_action(res: &mut Resources, action: ScriptAction) {
    match action {
        ScriptAction::Log(msg) => log::info!("script: {msg}"),
        ScriptAction::Clear(rgba) => match res.try_get_mut::<GpuContext>() {
            Some(gpu) => gpu.clear_color = rgba,
            None => log::debug!("script: no gpu context, clear ignored"),
        },
        ScriptAction::Quit => {
            log::info!("script: quit");
            res.get_or_create::<PlatformState>().request_quit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neoframe_core::{Engine, EngineConfig, Frame};

    #[test]
    fn parses_and_orders_commands() {
        let src = "\
# intro
at 1.5 quit
at 0 log hello   world

at 0.5 clear 1 0 0
at 0.5 clear 0 0 1 0.5
";
        let cmds = parse_script(src).unwrap();
        let actions: Vec<&ScriptAction> = cmds.iter().map(|c| &c.action).collect();
        assert_eq!(
            actions,
            [
                &ScriptAction::Log("hello world".to_owned()),
                &ScriptAction::Clear([1.0, 0.0, 0.0, 1.0]),
                &ScriptAction::Clear([0.0, 0.0, 1.0, 0.5]),
                &ScriptAction::Quit,
            ]
        );
    }

    #[test]
    fn reports_offending_line() {
        let err = parse_script("at 0 log ok\nat -1 quit").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");

        assert!(parse_script("wait 1 quit").is_err());
        assert!(parse_script("at 1 clear 1 2").is_err());
        assert!(parse_script("at 1 jump").is_err());
    }

    #[test]
    fn advance_releases_each_command_once() {
        let mut s = ScriptState::default();
        s.load(parse_script("at 0.1 log a\nat 0.2 log b\nat 0.2 quit").unwrap());

        assert!(s.advance(0.05).is_empty());
        assert_eq!(s.advance(0.05).len(), 1);
        assert_eq!(s.advance(0.2).len(), 2);
        assert!(s.advance(1.0).is_empty());
        assert!(s.is_finished());
    }

    #[test]
    fn script_gates_its_update_and_quits() {
        let mut e = Engine::new(EngineConfig::non_aborting()).unwrap();
        e.add_module(Box::new(ScriptModule::inline("at 0.05 quit"))).unwrap();
        e.start().unwrap();
        assert!(e.resources().try_get::<ScriptState>().is_some_and(|s| s.loaded));

        e.tick(Frame::new(1, 0.03)).unwrap();
        assert!(!e.should_quit());
        e.tick(Frame::new(2, 0.03)).unwrap();
        assert!(e.should_quit());
    }

    #[test]
    fn broken_script_raises_fault_and_stays_disabled() {
        let mut e = Engine::new(EngineConfig::non_aborting()).unwrap();
        e.add_module(Box::new(ScriptModule::inline("at 0 quit\nbogus"))).unwrap();
        e.start().unwrap();

        let state = e.resources().try_get::<ScriptState>().unwrap();
        assert!(state.fault.is_raised());
        assert!(!state.loaded);

        for i in 1..=3 {
            e.tick(Frame::new(i, 0.1)).unwrap();
        }
        assert!(!e.should_quit());
        assert_eq!(e.resources().try_get::<ScriptState>().unwrap().elapsed, 0.0);
    }

    #[test]
    fn no_script_is_not_a_fault() {
        let mut e = Engine::new(EngineConfig::non_aborting()).unwrap();
        e.add_module(Box::new(ScriptModule::from_path(None))).unwrap();
        e.start().unwrap();

        let state = e.resources().try_get::<ScriptState>().unwrap();
        assert!(!state.fault.is_raised());
        assert!(!state.loaded);
    }
}
