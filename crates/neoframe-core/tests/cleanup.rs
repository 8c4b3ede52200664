use neoframe_core::{
    Engine, EngineConfig, EngineResult, Module, ModuleBuilder, ModuleRegistry, Resources,
};

use std::cell::RefCell;
use std::rc::Rc;

/// Stand-in for a device: counts destroy calls per handle.
#[derive(Default)]
struct MockDevice {
    destroyed: Vec<&'static str>,
}

/// Handles owned by one module; zero means released.
#[derive(Default)]
struct MockContext {
    buffer: u64,
    image: u64,
}

fn release(dev: &mut MockDevice, name: &'static str, handle: &mut u64) {
    if *handle != 0 {
        dev.destroyed.push(name);
        *handle = 0;
    }
}

#[test]
fn broadcast_twice_marks_modules_once() {
    let mut reg = ModuleRegistry::new();
    let mut res = Resources::new();

    let m1 = reg.register_module("M1").unwrap();
    let m2 = reg.register_module("M2").unwrap();

    assert_eq!(reg.broadcast_cleanup(&mut res), 2);
    assert!(reg.is_cleaned(m1));
    assert!(reg.is_cleaned(m2));

    assert_eq!(reg.broadcast_cleanup(&mut res), 0);
    assert!(reg.is_cleaned(m1) && reg.is_cleaned(m2));
}

#[test]
fn second_broadcast_destroys_nothing() {
    let mut reg = ModuleRegistry::new();
    let mut res = Resources::new();

    let gpu = reg.register_module("gpu").unwrap();
    {
        let ctx = res.get_or_create::<MockContext>();
        ctx.buffer = 11;
        ctx.image = 12;
    }

    // Two callbacks releasing the same handles, as overlapping modules might.
    for _ in 0..2 {
        reg.subscribe_cleanup(
            gpu,
            Box::new(|res: &mut Resources| {
                let (mut buffer, mut image) = match res.try_get::<MockContext>() {
                    Some(c) => (c.buffer, c.image),
                    None => return,
                };
                let dev = res.get_or_create::<MockDevice>();
                release(dev, "buffer", &mut buffer);
                release(dev, "image", &mut image);
                let ctx = res.get_or_create::<MockContext>();
                ctx.buffer = buffer;
                ctx.image = image;
            }),
        )
        .unwrap();
    }

    reg.broadcast_cleanup(&mut res);
    assert_eq!(res.try_get::<MockDevice>().unwrap().destroyed, ["buffer", "image"]);

    reg.broadcast_cleanup(&mut res);
    assert_eq!(res.try_get::<MockDevice>().unwrap().destroyed.len(), 2);
}

struct Owner {
    name: &'static str,
    log: Rc<RefCell<Vec<&'static str>>>,
}

impl Module for Owner {
    fn name(&self) -> &'static str {
        self.name
    }

    fn build(self: Box<Self>, b: &mut ModuleBuilder<'_>) -> EngineResult<()> {
        let Owner { name, log } = *self;
        b.on_cleanup(move |_res: &mut Resources| log.borrow_mut().push(name))
    }
}

#[test]
fn dropping_an_engine_cleans_every_module_once() {
    let log = Rc::new(RefCell::new(Vec::new()));
    {
        let mut engine = Engine::new(EngineConfig::non_aborting()).unwrap();
        for name in ["M1", "M2"] {
            engine
                .add_module(Box::new(Owner {
                    name,
                    log: Rc::clone(&log),
                }))
                .unwrap();
        }
        engine.start().unwrap();
        assert_eq!(engine.shutdown(), 2);
        assert_eq!(engine.shutdown(), 0);
    }
    assert_eq!(*log.borrow(), ["M2", "M1"]);

    let log = Rc::new(RefCell::new(Vec::new()));
    {
        let mut engine = Engine::new(EngineConfig::non_aborting()).unwrap();
        engine
            .add_module(Box::new(Owner {
                name: "M1",
                log: Rc::clone(&log),
            }))
            .unwrap();
    }
    assert_eq!(*log.borrow(), ["M1"]);
}

#[test]
fn duplicate_module_name_is_rejected() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut engine = Engine::new(EngineConfig::non_aborting()).unwrap();
    let owner = |name| {
        Box::new(Owner {
            name,
            log: Rc::clone(&log),
        })
    };
    engine.add_module(owner("M1")).unwrap();
    assert!(engine.add_module(owner("M1")).is_err());
}
