use crate::error::EngineResult;
use crate::phase::{PhaseGraph, PhaseId};

/// One-time setup chain.
#[derive(Debug, Clone, Copy)]
pub struct SetupPhases {
    pub instance: PhaseId,
    pub surface: PhaseId,
    pub device: PhaseId,
    pub swapchain: PhaseId,
    pub render_pass: PhaseId,
    pub framebuffers: PhaseId,
    pub command_pool: PhaseId,
    pub command_buffer: PhaseId,
    pub pipeline: PhaseId,
    pub sync_objects: PhaseId,
    pub module_setup: PhaseId,
}

/// Per-frame chain.
#[derive(Debug, Clone, Copy)]
pub struct FramePhases {
    pub logic_update: PhaseId,
    pub begin_render: PhaseId,
    pub begin_command_buffer: PhaseId,
    pub begin_gui: PhaseId,
    pub update_gui: PhaseId,
    pub end_gui: PhaseId,
    pub render: PhaseId,
    pub end_command_buffer: PhaseId,
    pub end_render: PhaseId,
}

/// Handles for the built-in phases modules bind their tasks to.
#[derive(Debug, Clone, Copy)]
pub struct StandardPhases {
    pub setup: SetupPhases,
    pub frame: FramePhases,
}

impl StandardPhases {
    pub const SETUP_CHAIN: [&'static str; 11] = [
        "instance",
        "surface",
        "device",
        "swapchain",
        "render-pass",
        "framebuffers",
        "command-pool",
        "command-buffer",
        "pipeline",
        "sync-objects",
        "module-setup",
    ];

    pub const FRAME_CHAIN: [&'static str; 9] = [
        "logic-update",
        "begin-render",
        "begin-command-buffer",
        "begin-gui",
        "update-gui",
        "end-gui",
        "render",
        "end-command-buffer",
        "end-render",
    ];

    /// Declares both chains, each phase depending on its predecessor.
    pub fn declare(setup: &mut PhaseGraph, frame: &mut PhaseGraph) -> EngineResult<Self> {
        let s = declare_chain(setup, Self::SETUP_CHAIN)?;
        let f = declare_chain(frame, Self::FRAME_CHAIN)?;

        Ok(Self {
            setup: SetupPhases {
                instance: s[0],
                surface: s[1],
                device: s[2],
                swapchain: s[3],
                render_pass: s[4],
                framebuffers: s[5],
                command_pool: s[6],
                command_buffer: s[7],
                pipeline: s[8],
                sync_objects: s[9],
                module_setup: s[10],
            },
            frame: FramePhases {
                logic_update: f[0],
                begin_render: f[1],
                begin_command_buffer: f[2],
                begin_gui: f[3],
                update_gui: f[4],
                end_gui: f[5],
                render: f[6],
                end_command_buffer: f[7],
                end_render: f[8],
            },
        })
    }
}

fn declare_chain<const N: usize>(
    graph: &mut PhaseGraph,
    names: [&str; N],
) -> EngineResult<[PhaseId; N]> {
    let ids: [PhaseId; N] = names.map(|name| graph.declare_phase(name));
    for pair in ids.windows(2) {
        graph.add_dependency(pair[1], pair[0])?;
    }
    Ok(ids)
}
