use crate::module::FaultFlag;

/// Platform/window state block.
///
/// Written by the platform layer, read by every module. `should_quit` is the only
/// loop-level exit condition; it is polled once per tick boundary.
#[derive(Debug, Default)]
pub struct PlatformState {
    pub should_quit: bool,
    pub width: u32,
    pub height: u32,
    pub fault: FaultFlag,
    resized: bool,
}

impl PlatformState {
    #[inline]
    pub fn request_quit(&mut self) {
        self.should_quit = true;
    }

    /// Records a new surface size and marks a pending resize.
    pub fn set_size(&mut self, width: u32, height: u32) {
        if self.width != width || self.height != height {
            self.width = width;
            self.height = height;
            self.resized = true;
        }
    }

    /// Returns the new size once per resize.
    #[inline]
    pub fn take_resized(&mut self) -> Option<(u32, u32)> {
        if std::mem::take(&mut self.resized) {
            Some((self.width, self.height))
        } else {
            None
        }
    }

    #[inline]
    pub fn is_minimized(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_is_reported_once() {
        let mut p = PlatformState::default();
        p.set_size(800, 600);
        assert_eq!(p.take_resized(), Some((800, 600)));
        assert_eq!(p.take_resized(), None);

        p.set_size(800, 600);
        assert_eq!(p.take_resized(), None);
    }
}
