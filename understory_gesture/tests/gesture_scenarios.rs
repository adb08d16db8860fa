// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Whole-binding scenarios: recognizers on a hit target, fed a scripted pointer stream.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use kurbo::{Point, Vec2};
use understory_gesture::arena::GestureArenaMember;
use understory_gesture::binding::{
    GestureBinding, HitTestEntry, HitTestResult, HitTestTarget, HitTestable, RecognizerTarget,
};
use understory_gesture::converter::{PointerChange, PointerData};
use understory_gesture::events::{PointerEvent, PointerEventKind, PointerId};
use understory_gesture::monodrag::DragGestureRecognizer;
use understory_gesture::multitap::DoubleTapGestureRecognizer;
use understory_gesture::recognizer::{GestureRecognizer, OneSequenceGestureRecognizer};
use understory_gesture::scale::ScaleGestureRecognizer;
use understory_gesture::settings::GestureSettings;
use understory_gesture::tap::TapGestureRecognizer;
use understory_gesture::team::GestureArenaTeam;

const P1: PointerId = PointerId(11);
const P2: PointerId = PointerId(12);

struct Everywhere(Rc<RecognizerTarget>);

impl HitTestable for Everywhere {
    fn hit_test(&self, result: &mut HitTestResult, _position: Point) {
        result.add(self.0.clone());
    }
}

/// A binding whose whole surface offers pointers to one set of recognizers.
struct Surface {
    binding: Rc<GestureBinding>,
    target: Rc<RecognizerTarget>,
    positions: RefCell<BTreeMap<PointerId, Point>>,
    log: Rc<RefCell<Vec<String>>>,
}

impl Surface {
    fn new() -> Self {
        let binding = GestureBinding::new(GestureSettings::default());
        let target = Rc::new(RecognizerTarget::default());
        binding.set_hit_testable(Some(Rc::new(Everywhere(target.clone()))));
        Self {
            binding,
            target,
            positions: RefCell::new(BTreeMap::new()),
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn add(&self, recognizer: Rc<dyn GestureRecognizer>) {
        self.target.push(recognizer);
    }

    fn push(&self, line: String) {
        self.log.borrow_mut().push(line);
    }

    fn take(&self) -> Vec<String> {
        core::mem::take(&mut *self.log.borrow_mut())
    }

    fn stamp(&self, event: PointerEvent) -> PointerEvent {
        event.with_time_stamp(self.binding.scheduler().now())
    }

    fn down(&self, pointer: PointerId, x: f64, y: f64) {
        let position = Point::new(x, y);
        self.positions.borrow_mut().insert(pointer, position);
        self.binding
            .handle_pointer_event(self.stamp(PointerEvent::down(pointer, position)));
    }

    fn move_to(&self, pointer: PointerId, x: f64, y: f64) {
        let position = Point::new(x, y);
        let from = self.positions.borrow_mut().insert(pointer, position);
        let delta = from.map_or(Vec2::ZERO, |from| position - from);
        self.binding
            .handle_pointer_event(self.stamp(PointerEvent::moved(pointer, position, delta)));
    }

    fn up(&self, pointer: PointerId) {
        let position = self.positions.borrow_mut().remove(&pointer);
        let position = position.unwrap_or(Point::ORIGIN);
        self.binding
            .handle_pointer_event(self.stamp(PointerEvent::up(pointer, position)));
    }

    fn wait(&self, ms: u64) {
        self.binding.advance_by(Duration::from_millis(ms));
    }
}

fn logged_tap(surface: &Surface) -> Rc<TapGestureRecognizer> {
    let tap = TapGestureRecognizer::new(&surface.binding);
    let log = surface.log.clone();
    tap.set_on_tap_down(move |_| log.borrow_mut().push("tap down".into()));
    let log = surface.log.clone();
    tap.set_on_tap(move || log.borrow_mut().push("tap".into()));
    let log = surface.log.clone();
    tap.set_on_tap_cancel(move |reason| log.borrow_mut().push(format!("tap cancel {reason:?}")));
    tap
}

fn logged_drag(surface: &Surface, drag: &DragGestureRecognizer, name: &'static str) {
    let log = surface.log.clone();
    drag.set_on_start(move |_| log.borrow_mut().push(format!("{name} start")));
    let log = surface.log.clone();
    drag.set_on_update(move |d| {
        log.borrow_mut()
            .push(format!("{name} update {} {}", d.delta.x, d.delta.y));
    });
    let log = surface.log.clone();
    drag.set_on_end(move |_| log.borrow_mut().push(format!("{name} end")));
}

#[test]
fn quick_release_is_a_tap() {
    let s = Surface::new();
    let tap = logged_tap(&s);
    let drag = DragGestureRecognizer::horizontal(&s.binding);
    logged_drag(&s, &drag, "drag");
    s.add(tap);
    s.add(drag);

    s.down(P1, 10.0, 10.0);
    s.wait(50);
    assert!(s.take().is_empty(), "nothing decided yet");
    s.up(P1);
    assert_eq!(s.take(), ["tap down", "tap"]);
}

#[test]
fn moving_past_the_slop_is_a_drag() {
    let s = Surface::new();
    let tap = logged_tap(&s);
    let drag = DragGestureRecognizer::horizontal(&s.binding);
    logged_drag(&s, &drag, "drag");
    s.add(tap);
    s.add(drag);

    s.down(P1, 0.0, 0.0);
    s.wait(16);
    s.move_to(P1, 10.0, 0.0);
    assert!(s.take().is_empty(), "within the slop");
    s.wait(16);
    s.move_to(P1, 30.0, 0.0);
    assert_eq!(s.take(), ["drag start", "drag update 30 0"]);
    s.wait(16);
    s.move_to(P1, 35.0, 2.0);
    s.up(P1);
    assert_eq!(s.take(), ["drag update 5 0", "drag end"]);
}

#[test]
fn release_velocity_is_reported() {
    let s = Surface::new();
    let pan = DragGestureRecognizer::pan(&s.binding);
    let velocity = Rc::new(Cell::new(Vec2::ZERO));
    let v = velocity.clone();
    pan.set_on_end(move |d| v.set(d.velocity.pixels_per_second));
    s.add(pan);

    s.down(P1, 0.0, 0.0);
    for i in 1..=6 {
        s.wait(10);
        s.move_to(P1, f64::from(i) * 20.0, 0.0);
    }
    s.up(P1);
    let v = velocity.get();
    assert!((v.x - 2000.0).abs() < 1.0, "horizontal velocity {}", v.x);
    assert!(v.y.abs() < 1.0, "vertical velocity {}", v.y);
}

#[test]
fn second_tap_in_time_is_a_double_tap() {
    let s = Surface::new();
    let tap = logged_tap(&s);
    let double = DoubleTapGestureRecognizer::new(&s.binding);
    let log = s.log.clone();
    double.set_on_double_tap(move |d| {
        log.borrow_mut()
            .push(format!("double tap at {:?}", d.global_position));
    });
    s.add(tap);
    s.add(double);

    s.down(P1, 0.0, 0.0);
    s.wait(50);
    s.up(P1);
    assert!(s.take().is_empty(), "first tap held");
    s.wait(100);
    s.down(P2, 5.0, 5.0);
    s.wait(50);
    s.up(P2);
    assert_eq!(s.take(), ["double tap at (5.0, 5.0)"]);
    s.wait(500);
    assert!(s.take().is_empty(), "the single tap never fires");
    assert!(!s.binding.arena().has_arena(P1), "held arena released");
}

#[test]
fn lone_tap_fires_once_the_double_tap_times_out() {
    let s = Surface::new();
    let tap = logged_tap(&s);
    let double = DoubleTapGestureRecognizer::new(&s.binding);
    double.set_on_double_tap(|_| {});
    s.add(tap);
    s.add(double);

    s.down(P1, 0.0, 0.0);
    s.wait(50);
    s.up(P1);
    s.wait(299);
    assert!(s.take().is_empty(), "still waiting for a second tap");
    s.wait(1);
    assert_eq!(s.take(), ["tap down", "tap"]);
}

#[test]
fn team_lets_either_axis_win() {
    let s = Surface::new();
    let tap = logged_tap(&s);
    let horizontal = DragGestureRecognizer::horizontal(&s.binding);
    let vertical = DragGestureRecognizer::vertical(&s.binding);
    logged_drag(&s, &horizontal, "horizontal");
    logged_drag(&s, &vertical, "vertical");
    let team = GestureArenaTeam::new(s.binding.arena());
    horizontal.set_team(team.clone());
    vertical.set_team(team);
    s.add(tap);
    s.add(horizontal);
    s.add(vertical);

    s.down(P1, 0.0, 0.0);
    s.move_to(P1, 0.0, 25.0);
    s.up(P1);
    assert_eq!(s.take(), ["vertical start", "vertical update 0 25", "vertical end"]);
}

#[test]
fn captain_takes_the_team_win() {
    let s = Surface::new();
    let horizontal = DragGestureRecognizer::horizontal(&s.binding);
    let vertical = DragGestureRecognizer::vertical(&s.binding);
    logged_drag(&s, &horizontal, "horizontal");
    logged_drag(&s, &vertical, "vertical");
    let tap = logged_tap(&s);
    let team = GestureArenaTeam::new(s.binding.arena());
    horizontal.set_team(team.clone());
    vertical.set_team(team.clone());
    let captain: Rc<dyn GestureArenaMember> = horizontal.clone();
    team.set_captain(Some(captain));
    s.add(tap);
    s.add(horizontal);
    s.add(vertical);

    s.down(P1, 0.0, 0.0);
    s.move_to(P1, 0.0, 25.0);
    let log = s.take();
    assert!(log.contains(&"horizontal start".to_string()), "captain won: {log:?}");
    assert!(!log.iter().any(|l| l.starts_with("vertical")), "vertical lost: {log:?}");
}

#[test]
fn pinch_reports_the_scale() {
    let s = Surface::new();
    let scale = ScaleGestureRecognizer::new(&s.binding);
    let last = Rc::new(Cell::new(None));
    let l = last.clone();
    scale.set_on_update(move |d| l.set(Some((d.scale, d.rotation))));
    s.add(scale);

    s.down(P1, 100.0, 100.0);
    s.down(P2, 200.0, 100.0);
    s.move_to(P1, 50.0, 100.0);
    s.move_to(P2, 250.0, 100.0);
    let (factor, rotation) = last.get().unwrap_or_default();
    assert!((factor - 2.0).abs() < 1e-9, "scale {factor}");
    assert!(rotation.abs() < 1e-9, "rotation {rotation}");
}

#[test]
fn panicking_callback_leaves_the_binding_usable() {
    let s = Surface::new();
    let tap = TapGestureRecognizer::new(&s.binding);
    let taps = Rc::new(Cell::new(0));
    let t = taps.clone();
    tap.set_on_tap(move || {
        t.set(t.get() + 1);
        panic!("tap handler failure");
    });
    s.add(tap);

    for _ in 0..2 {
        s.down(P1, 0.0, 0.0);
        s.up(P1);
    }
    assert_eq!(taps.get(), 2);
}

#[test]
fn wheel_scroll_is_ignored_mid_drag() {
    let s = Surface::new();
    let pan = DragGestureRecognizer::pan(&s.binding);
    logged_drag(&s, &pan, "pan");
    s.add(pan);

    let wheel = PointerEvent::scroll(Point::new(5.0, 5.0), Vec2::new(0.0, -30.0));
    s.binding.handle_pointer_event(wheel);
    assert_eq!(s.take(), ["pan start", "pan update 0 -30", "pan end"]);

    s.down(P1, 0.0, 0.0);
    s.take();
    s.binding.handle_pointer_event(wheel);
    assert!(s.take().is_empty(), "wheel ignored while a finger is down");
    s.up(P1);
    s.push("lifted".into());
    assert_eq!(s.take(), ["pan end", "lifted"]);
}

/// Records the hover transitions a region sees.
struct Region {
    name: &'static str,
    log: Rc<RefCell<Vec<String>>>,
}

impl HitTestTarget for Region {
    fn handle_event(&self, event: &PointerEvent, _: &HitTestEntry) {
        let what = match event.kind {
            PointerEventKind::Enter => "enter",
            PointerEventKind::Exit => "exit",
            _ => return,
        };
        self.log.borrow_mut().push(format!("{what} {}", self.name));
    }
}

/// A button nested in a panel: `x < 50` hits both, `x < 100` hits the panel.
struct Nested {
    button: Rc<dyn HitTestTarget>,
    panel: Rc<dyn HitTestTarget>,
}

impl HitTestable for Nested {
    fn hit_test(&self, result: &mut HitTestResult, position: Point) {
        if position.x < 50.0 {
            result.add(self.button.clone());
        }
        if position.x < 100.0 {
            result.add(self.panel.clone());
        }
    }
}

#[test]
fn hovering_mouse_enters_and_leaves_nested_regions() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let region = |name: &'static str| -> Rc<dyn HitTestTarget> {
        Rc::new(Region {
            name,
            log: log.clone(),
        })
    };
    let binding = GestureBinding::new(GestureSettings::default());
    binding.set_hit_testable(Some(Rc::new(Nested {
        button: region("button"),
        panel: region("panel"),
    })));
    let hover = |x: f64| PointerData::new(PointerChange::Hover, 3, Point::new(x, 10.0));

    binding.handle_pointer_data(&[hover(20.0), hover(40.0)], 1.0);
    assert_eq!(core::mem::take(&mut *log.borrow_mut()), ["enter panel", "enter button"]);
    binding.handle_pointer_data(&[hover(70.0)], 1.0);
    assert_eq!(core::mem::take(&mut *log.borrow_mut()), ["exit button"]);
    binding.handle_pointer_data(&[hover(30.0)], 1.0);
    assert_eq!(core::mem::take(&mut *log.borrow_mut()), ["enter button"]);
    binding.handle_pointer_data(
        &[PointerData::new(PointerChange::Remove, 3, Point::new(30.0, 10.0))],
        1.0,
    );
    assert_eq!(core::mem::take(&mut *log.borrow_mut()), ["exit button", "exit panel"]);
}
