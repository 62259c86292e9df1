//! Frame sources: where surface textures come from
//!
//! Decoders and capture devices live outside this crate. They hand finished
//! textures to a [`FrameSlot`]; the render thread latches the slot once per
//! tick so every draw of a frame samples the same texture.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Supplies the texture sampled by surface draws
pub trait FrameSource {
    /// Backend texture handle (cheap to clone)
    type Texture: Clone;

    /// Texture for the current frame, if one is available
    fn current_texture(&self) -> Option<Self::Texture>;

    /// Called once at the start of every frame, before any draw
    fn begin_frame(&self) {}
}

/// Double-buffered handoff between a producer thread and the render thread
#[derive(Debug)]
pub struct FrameSlot<T> {
    pending: Mutex<Option<T>>,
    current: Mutex<Option<T>>,
}

impl<T> Default for FrameSlot<T> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(None),
            current: Mutex::new(None),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Clone> FrameSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer side: make a new texture available for the next frame.
    ///
    /// A texture published twice before a latch replaces the older one.
    pub fn publish(&self, texture: T) {
        *lock(&self.pending) = Some(texture);
    }

    /// Render side: promote the pending texture to current.
    ///
    /// Returns `true` when a new texture was latched.
    pub fn latch(&self) -> bool {
        let next = lock(&self.pending).take();
        match next {
            Some(texture) => {
                *lock(&self.current) = Some(texture);
                true
            }
            None => false,
        }
    }

    /// Texture latched for the current frame
    pub fn current(&self) -> Option<T> {
        lock(&self.current).clone()
    }

    /// Drop both the pending and the current texture
    pub fn clear(&self) {
        lock(&self.pending).take();
        lock(&self.current).take();
    }
}

impl<T: Clone> FrameSource for FrameSlot<T> {
    type Texture = T;

    fn current_texture(&self) -> Option<T> {
        self.current()
    }

    fn begin_frame(&self) {
        self.latch();
    }
}

/// Source that always returns the same texture (still images, test cards)
#[derive(Debug, Clone)]
pub struct StillSource<T>(pub T);

impl<T: Clone> FrameSource for StillSource<T> {
    type Texture = T;

    fn current_texture(&self) -> Option<T> {
        Some(self.0.clone())
    }
}

/// Source with no texture at all
#[derive(Debug)]
pub struct NoSource<T>(std::marker::PhantomData<T>);

impl<T> Default for NoSource<T> {
    fn default() -> Self {
        Self(std::marker::PhantomData)
    }
}

impl<T: Clone> FrameSource for NoSource<T> {
    type Texture = T;

    fn current_texture(&self) -> Option<T> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_publish_is_invisible_until_latch() {
        let slot = FrameSlot::new();
        slot.publish(1u32);
        assert_eq!(slot.current_texture(), None);

        slot.begin_frame();
        assert_eq!(slot.current_texture(), Some(1));

        // Nothing pending: current is kept
        assert!(!slot.latch());
        assert_eq!(slot.current_texture(), Some(1));
    }

    #[test]
    fn test_latest_publish_wins() {
        let slot = FrameSlot::new();
        slot.publish("a");
        slot.publish("b");
        slot.latch();
        assert_eq!(slot.current(), Some("b"));

        slot.clear();
        assert_eq!(slot.current(), None);
    }

    #[test]
    fn test_producer_thread_handoff() {
        let slot = Arc::new(FrameSlot::new());
        let producer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                for frame in 0..100u64 {
                    slot.publish(Arc::new(vec![frame; 16]));
                }
            })
        };
        producer.join().unwrap();

        slot.latch();
        let frame = slot.current_texture().unwrap();
        // A latched frame is always whole
        assert!(frame.iter().all(|&v| v == frame[0]));
        assert_eq!(frame[0], 99);
    }

    #[test]
    fn test_still_and_empty_sources() {
        assert_eq!(StillSource(7).current_texture(), Some(7));
        assert_eq!(NoSource::<u8>::default().current_texture(), None);
    }
}
