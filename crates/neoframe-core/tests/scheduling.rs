use neoframe_core::sched::TaskFn;
use neoframe_core::{
    Engine, EngineConfig, EngineError, EngineResult, Executor, Frame, Module, ModuleBuilder,
    ModuleCtx, PhaseGraph, Resources,
};

#[derive(Default)]
struct Trace(Vec<String>);

fn append(tag: &'static str) -> TaskFn {
    Box::new(move |ctx: &mut ModuleCtx<'_>| {
        ctx.resources_mut()
            .get_or_create::<Trace>()
            .0
            .push(tag.to_owned());
        Ok(())
    })
}

fn drain(res: &mut Resources) -> Vec<String> {
    std::mem::take(&mut res.get_or_create::<Trace>().0)
}

#[test]
fn chain_a_b_c_runs_in_dependency_order() {
    let mut g = PhaseGraph::new();
    // Declared out of order on purpose.
    let c = g.declare_phase("C");
    let a = g.declare_phase("A");
    let b = g.declare_phase("B");
    g.add_dependency(b, a).unwrap();
    g.add_dependency(c, b).unwrap();

    let mut exec = Executor::new("test", g);
    exec.register_task(c, "m", append("C"), true).unwrap();
    exec.register_task(b, "m", append("B"), true).unwrap();
    exec.register_task(a, "m", append("A"), true).unwrap();
    exec.finalize().unwrap();

    let mut res = Resources::new();
    exec.tick(&mut res, Frame::new(0, 0.016)).unwrap();
    assert_eq!(drain(&mut res), ["A", "B", "C"]);
}

#[test]
fn order_is_identical_across_ticks() {
    let mut g = PhaseGraph::new();
    let roots: Vec<_> = (0..4).map(|i| g.declare_phase(&format!("root{i}"))).collect();
    let join = g.declare_phase("join");
    for &r in &roots {
        g.add_dependency(join, r).unwrap();
    }

    let mut exec = Executor::new("test", g);
    let tags = ["r0", "r1", "r2", "r3"];
    for (&r, tag) in roots.iter().zip(tags) {
        exec.register_task(r, "m", append(tag), true).unwrap();
    }
    exec.register_task(join, "m", append("j1"), true).unwrap();
    exec.register_task(join, "m", append("j2"), true).unwrap();
    exec.finalize().unwrap();

    let mut res = Resources::new();
    let plan = exec.plan();
    exec.tick(&mut res, Frame::new(0, 0.01)).unwrap();
    let first = drain(&mut res);

    for i in 1..16 {
        exec.tick(&mut res, Frame::new(i, 0.01)).unwrap();
        assert_eq!(drain(&mut res), first);
        assert_eq!(exec.plan(), plan);
    }
    assert_eq!(first, ["r0", "r1", "r2", "r3", "j1", "j2"]);
}

#[test]
fn every_task_of_a_tick_sees_the_same_frame() {
    #[derive(Default)]
    struct Seen(Vec<(u64, f32)>);

    let mut g = PhaseGraph::new();
    let p = g.declare_phase("p");
    let q = g.declare_phase("q");
    g.add_dependency(q, p).unwrap();

    let mut exec = Executor::new("test", g);
    for phase in [p, q, q] {
        exec.register_task(
            phase,
            "m",
            Box::new(|ctx: &mut ModuleCtx<'_>| {
                let f = ctx.frame();
                ctx.resources_mut().get_or_create::<Seen>().0.push((f.index, f.dt));
                Ok(())
            }),
            true,
        )
        .unwrap();
    }
    exec.finalize().unwrap();

    let mut res = Resources::new();
    exec.tick(&mut res, Frame::new(7, 0.02)).unwrap();
    let seen = &res.try_get::<Seen>().unwrap().0;
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|&s| s == (7, 0.02)));
}

struct Cyclic;

impl Module for Cyclic {
    fn name(&self) -> &'static str {
        "cyclic"
    }

    fn build(self: Box<Self>, b: &mut ModuleBuilder<'_>) -> EngineResult<()> {
        let render = b.phases().frame.render;
        let logic = b.phases().frame.logic_update;
        // render already follows logic-update; asking for the reverse closes a loop.
        b.declare_frame_phase("feedback", &[render], &[logic])?;
        Ok(())
    }
}

#[test]
fn cycle_is_rejected_before_anything_runs() {
    let mut engine = Engine::new(EngineConfig::non_aborting()).unwrap();
    let err = engine.add_module(Box::new(Cyclic)).unwrap_err();
    assert!(matches!(err, EngineError::Cycle { .. }));
    assert!(err.is_fatal());
}

#[test]
fn cycle_keeps_the_scheduler_from_starting() {
    let mut engine = Engine::new(EngineConfig::non_aborting()).unwrap();
    assert!(engine.add_module(Box::new(Cyclic)).is_err());
    assert!(matches!(engine.failure(), Some(EngineError::Cycle { .. })));

    // The rejected module left nothing behind, yet the engine stays unusable.
    assert!(engine.registry().is_empty());
    assert_eq!(engine.frame_executor().graph().lookup("feedback"), None);

    assert!(matches!(engine.start(), Err(EngineError::Cycle { .. })));
    assert!(!engine.is_started());
    assert!(matches!(engine.tick(Frame::new(1, 0.016)), Err(EngineError::Cycle { .. })));

    let mut clock = engine.make_clock();
    assert!(engine.run(&mut clock, |_| Ok(())).is_err());
}

struct HalfBuilt {
    fail: bool,
}

impl Module for HalfBuilt {
    fn name(&self) -> &'static str {
        "half-built"
    }

    fn build(self: Box<Self>, b: &mut ModuleBuilder<'_>) -> EngineResult<()> {
        let phases = *b.phases();
        b.setup_task(phases.setup.module_setup, append("setup"))?;
        b.frame_task(phases.frame.render, append("frame"))?;
        b.on_cleanup(|res: &mut Resources| {
            res.get_or_create::<Trace>().0.push("cleanup".to_owned());
        })?;
        b.declare_frame_phase("overlay", &[phases.frame.render], &[])?;

        if self.fail {
            return Err(EngineError::other("font atlas missing"));
        }
        Ok(())
    }
}

#[test]
fn failed_build_leaves_nothing_registered() {
    let mut engine = Engine::new(EngineConfig::non_aborting()).unwrap();

    let err = engine.add_module(Box::new(HalfBuilt { fail: true })).unwrap_err();
    assert!(!err.is_fatal());
    assert!(engine.failure().is_none());
    assert!(engine.registry().is_empty());
    assert_eq!(engine.registry().lookup("half-built"), None);
    assert_eq!(engine.frame_executor().task_count(), 0);
    assert_eq!(engine.frame_executor().graph().lookup("overlay"), None);

    // Same name again, this time complete.
    engine.add_module(Box::new(HalfBuilt { fail: false })).unwrap();
    engine.start().unwrap();
    engine.tick(Frame::new(1, 0.016)).unwrap();
    assert_eq!(drain(engine.resources_mut()), ["setup", "frame"]);

    assert_eq!(engine.shutdown(), 1);
    assert_eq!(drain(engine.resources_mut()), ["cleanup"]);
}

#[test]
fn disabled_task_is_skipped_until_enabled() {
    let mut g = PhaseGraph::new();
    let p = g.declare_phase("p");

    let mut exec = Executor::new("test", g);
    let gated = exec.register_task(p, "m", append("gated"), false).unwrap();
    exec.register_task(p, "m", append("always"), true).unwrap();
    exec.finalize().unwrap();

    let mut res = Resources::new();
    let report = exec.tick(&mut res, Frame::new(0, 0.0)).unwrap();
    assert_eq!(report.disabled, 1);
    assert_eq!(drain(&mut res), ["always"]);

    assert!(exec.set_task_enabled(gated, true));
    exec.tick(&mut res, Frame::new(1, 0.0)).unwrap();
    assert_eq!(drain(&mut res), ["gated", "always"]);
}
