//! Normalization of the three raw input sources into one pointer stream.
//!
//! Mouse, touch and native drag-and-drop events differ only in how the
//! coordinate is extracted and which platform default must be suppressed.
//! Everything downstream of [`InputAdapter::normalize`] is shared.

use crate::workspace::grid::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAdapter {
    Pointer,
    Touch,
    NativeDragDrop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MousePhase {
    Down,
    Move,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseInput {
    pub phase: MousePhase,
    pub position: Point,
    pub button: MouseButton,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Start,
    Move,
    End,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub id: u64,
    pub position: Point,
}

/// A touch event. `touches` holds the active touches for start/move and the
/// changed touches for end/cancel, which may be empty.
#[derive(Debug, Clone, PartialEq)]
pub struct TouchInput {
    pub phase: TouchPhase,
    pub touches: Vec<TouchPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragDropPhase {
    DragStart,
    DragOver,
    Drop,
    DragEnd,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragDropInput {
    pub phase: DragDropPhase,
    pub position: Option<Point>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    Mouse(MouseInput),
    Touch(TouchInput),
    DragDrop(DragDropInput),
    /// Escape pressed while a gesture may be in flight.
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Start,
    Move,
    End,
    Cancel,
}

/// Modality independent pointer event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub adapter: InputAdapter,
    pub phase: PointerPhase,
    /// `None` when the platform reports no coordinate (touch end without
    /// changed touches, drag end outside the window).
    pub position: Option<Point>,
}

/// Platform default the host must suppress for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultAction {
    Allow,
    /// Stop text selection / native image drag.
    PreventDefault,
    /// Stop the page from scrolling under a touch drag.
    PreventScroll,
    /// Accept the native drop so a `Drop` event follows.
    AcceptDrop,
}

impl InputAdapter {
    pub fn of(raw: &RawInput) -> Option<Self> {
        match raw {
            RawInput::Mouse(_) => Some(InputAdapter::Pointer),
            RawInput::Touch(_) => Some(InputAdapter::Touch),
            RawInput::DragDrop(_) => Some(InputAdapter::NativeDragDrop),
            RawInput::Escape => None,
        }
    }

    /// Convert a raw event into a [`PointerEvent`]. Events that can never take
    /// part in a tile drag (secondary buttons, multi-touch starts) yield
    /// `None`.
    pub fn normalize(raw: &RawInput) -> Option<PointerEvent> {
        match raw {
            RawInput::Mouse(m) => {
                if m.button != MouseButton::Primary && m.phase != MousePhase::Move {
                    return None;
                }
                let phase = match m.phase {
                    MousePhase::Down => PointerPhase::Start,
                    MousePhase::Move => PointerPhase::Move,
                    MousePhase::Up => PointerPhase::End,
                };
                Some(PointerEvent {
                    adapter: InputAdapter::Pointer,
                    phase,
                    position: Some(m.position),
                })
            }
            RawInput::Touch(t) => {
                let phase = match t.phase {
                    TouchPhase::Start => {
                        if t.touches.len() != 1 {
                            return None;
                        }
                        PointerPhase::Start
                    }
                    TouchPhase::Move => PointerPhase::Move,
                    TouchPhase::End => PointerPhase::End,
                    TouchPhase::Cancel => PointerPhase::Cancel,
                };
                Some(PointerEvent {
                    adapter: InputAdapter::Touch,
                    phase,
                    position: t.touches.first().map(|p| p.position),
                })
            }
            RawInput::DragDrop(d) => {
                let phase = match d.phase {
                    DragDropPhase::DragStart => PointerPhase::Start,
                    DragDropPhase::DragOver => PointerPhase::Move,
                    DragDropPhase::Drop => PointerPhase::End,
                    DragDropPhase::DragEnd => PointerPhase::Cancel,
                };
                Some(PointerEvent {
                    adapter: InputAdapter::NativeDragDrop,
                    phase,
                    position: d.position,
                })
            }
            RawInput::Escape => None,
        }
    }

    /// Default the host must suppress for an event of `phase` given whether a
    /// drag is active after the event was processed.
    pub fn suppression(self, phase: PointerPhase, dragging: bool) -> DefaultAction {
        match self {
            InputAdapter::Pointer => {
                if dragging {
                    DefaultAction::PreventDefault
                } else {
                    DefaultAction::Allow
                }
            }
            InputAdapter::Touch => {
                if dragging && phase == PointerPhase::Move {
                    DefaultAction::PreventScroll
                } else if dragging {
                    DefaultAction::PreventDefault
                } else {
                    DefaultAction::Allow
                }
            }
            InputAdapter::NativeDragDrop => match phase {
                PointerPhase::Move | PointerPhase::End if dragging => DefaultAction::AcceptDrop,
                _ => DefaultAction::Allow,
            },
        }
    }
}
