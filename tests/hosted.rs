//! Integration tests against the hosted kernel
//!
//! Every test binds `HOSTED` (binding twice is a no-op) and runs serially,
//! since tasks, handles and timers live in process-wide tables.

use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use serial_test::serial;

use freertos::critical::{self, PortMux};
use freertos::error::OsError;
use freertos::port::hosted::HOSTED;
use freertos::port::HostKernel;
use freertos::sync::{self, SemaphoreHandle};
use freertos::task::{self, TaskHandle};
use freertos::timer::{self, TimerHandle};
use freertos::types::ObjKind;
use freertos::{prio, queue, CFG_MAX_DELAY};

fn setup() {
    freertos::init(&HOSTED).unwrap();
}

/// Poll `cond` every tick for up to a second
fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

#[cfg(test)]
mod kernel_tests {
    use super::*;

    #[test]
    #[serial]
    fn test_init_is_idempotent() {
        setup();
        assert!(freertos::kernel::is_initialized());
        assert_eq!(freertos::init(&HOSTED), Ok(()));
    }

    #[test]
    #[serial]
    fn test_tick_count_advances() {
        setup();
        let before = task::tick_count().unwrap();
        task::delay(3).unwrap();
        let after = task::tick_count().unwrap();
        assert!(after.wrapping_sub(before) >= 3);
        // zero delay returns immediately
        task::delay(0).unwrap();
    }
}

#[cfg(test)]
mod mutex_tests {
    use super::*;

    #[test]
    #[serial]
    fn test_mutex_count() {
        setup();
        let m = sync::create_mutex().unwrap();
        assert_eq!(sync::kind(m), Ok(ObjKind::Mutex));
        assert_eq!(sync::get_count(m), Ok(1));

        sync::take(m, 0).unwrap();
        assert_eq!(sync::get_count(m), Ok(0));
        assert_eq!(sync::take(m, 0), Err(OsError::WouldBlock));

        sync::give(m).unwrap();
        assert_eq!(sync::get_count(m), Ok(1));
        sync::delete(m).unwrap();
    }

    #[test]
    #[serial]
    fn test_timed_out_take_changes_nothing() {
        setup();
        let m = sync::create_mutex().unwrap();
        sync::take(m, CFG_MAX_DELAY).unwrap();

        let result = thread::spawn(move || sync::take(m, 3)).join().unwrap();
        assert_eq!(result, Err(OsError::Timeout));
        assert_eq!(sync::get_count(m), Ok(0));

        sync::give(m).unwrap();
        assert_eq!(sync::get_count(m), Ok(1));
        sync::delete(m).unwrap();
    }

    #[test]
    #[serial]
    fn test_blocked_take_wakes_on_give() {
        setup();
        let m = sync::create_mutex().unwrap();
        sync::take(m, 0).unwrap();

        let waiter = thread::spawn(move || sync::take(m, 100));
        thread::sleep(Duration::from_millis(30));
        // any task may release a plain mutex
        sync::give(m).unwrap();
        assert_eq!(waiter.join().unwrap(), Ok(()));
        assert_eq!(sync::get_count(m), Ok(0));

        sync::give(m).unwrap();
        sync::delete(m).unwrap();
    }

    #[test]
    #[serial]
    fn test_recursive_mutex_nesting() {
        setup();
        let m = sync::create_recursive_mutex().unwrap();
        for _ in 0..3 {
            sync::take_recursive(m, 0).unwrap();
        }
        assert_eq!(sync::recursive_count(m), Ok(3));
        assert_eq!(sync::get_count(m), Ok(0));

        let other = thread::spawn(move || sync::take_recursive(m, 0)).join().unwrap();
        assert_eq!(other, Err(OsError::WouldBlock));
        let other = thread::spawn(move || sync::give_recursive(m)).join().unwrap();
        assert_eq!(other, Err(OsError::NotOwner));

        for _ in 0..3 {
            sync::give_recursive(m).unwrap();
        }
        assert_eq!(sync::recursive_count(m), Ok(0));
        assert_eq!(sync::give_recursive(m), Err(OsError::NotOwner));

        // free again, another thread can have it
        let other = thread::spawn(move || {
            let taken = sync::take_recursive(m, 0);
            let _ = sync::give_recursive(m);
            taken
        })
        .join()
        .unwrap();
        assert_eq!(other, Ok(()));
        sync::delete(m).unwrap();
    }

    #[test]
    #[serial]
    fn test_recursive_mutex_refused_in_isr_calls() {
        setup();
        let m = sync::create_recursive_mutex().unwrap();
        assert_eq!(sync::give_from_isr(m), Err(OsError::IsrContext));
        assert_eq!(sync::take_from_isr(m), Err(OsError::IsrContext));
        sync::delete(m).unwrap();
    }
}

#[cfg(test)]
mod semaphore_tests {
    use super::*;

    #[test]
    #[serial]
    fn test_counting_semaphore_bounds() {
        setup();
        let s = sync::create_counting_semaphore(5, 2).unwrap();
        assert_eq!(sync::kind(s), Ok(ObjKind::CountingSemaphore));
        assert_eq!(sync::max_count(s), Ok(5));
        assert_eq!(sync::get_count(s), Ok(2));

        sync::give(s).unwrap();
        sync::give(s).unwrap();
        assert_eq!(sync::get_count(s), Ok(4));
        sync::give(s).unwrap();
        assert_eq!(sync::give(s), Err(OsError::Full));
        assert_eq!(sync::get_count(s), Ok(5));

        for _ in 0..5 {
            sync::take(s, 0).unwrap();
        }
        assert_eq!(sync::take(s, 0), Err(OsError::Empty));
        assert_eq!(sync::take(s, 2), Err(OsError::Timeout));
        assert_eq!(sync::get_count(s), Ok(0));
        sync::delete(s).unwrap();
    }

    #[test]
    #[serial]
    fn test_invalid_counts() {
        setup();
        assert_eq!(
            sync::create_counting_semaphore(0, 0),
            Err(OsError::InvalidParameter)
        );
        assert_eq!(
            sync::create_counting_semaphore(2, 3),
            Err(OsError::InvalidParameter)
        );
    }

    #[test]
    #[serial]
    fn test_binary_semaphore_starts_empty() {
        setup();
        let s = sync::create_binary_semaphore().unwrap();
        assert_eq!(sync::get_count(s), Ok(0));
        assert_eq!(sync::give_from_isr(s), Ok(true));
        assert_eq!(sync::give(s), Err(OsError::Full));
        assert_eq!(sync::take_from_isr(s), Ok(true));
        assert_eq!(sync::take_from_isr(s), Err(OsError::Empty));
        sync::delete(s).unwrap();
    }

    #[test]
    #[serial]
    fn test_handle_checks() {
        setup();
        let m = sync::create_mutex().unwrap();
        assert_eq!(sync::take_recursive(m, 0), Err(OsError::TypeMismatch));
        assert_eq!(sync::max_count(m), Err(OsError::TypeMismatch));
        assert_eq!(queue::send(m, &[0], 0), Err(OsError::TypeMismatch));

        sync::delete(m).unwrap();
        assert_eq!(sync::give(m), Err(OsError::InvalidHandle));
        assert_eq!(sync::delete(m), Err(OsError::InvalidHandle));

        // a recycled slot does not revive the old handle
        let fresh = sync::create_mutex().unwrap();
        assert_ne!(fresh, m);
        assert_eq!(sync::get_count(m), Err(OsError::InvalidHandle));
        sync::delete(fresh).unwrap();
    }
}

#[cfg(test)]
mod queue_tests {
    use super::*;

    #[test]
    #[serial]
    fn test_fifo_and_front() {
        setup();
        let q = queue::create(3, 4).unwrap();
        assert_eq!(sync::kind(q), Ok(ObjKind::Queue));
        queue::send(q, &1u32.to_ne_bytes(), 0).unwrap();
        queue::send_to_back(q, &2u32.to_ne_bytes(), 0).unwrap();
        queue::send_to_front(q, &0u32.to_ne_bytes(), 0).unwrap();
        assert_eq!(queue::messages_waiting(q), Ok(3));
        assert_eq!(queue::spaces_available(q), Ok(0));

        let mut out = [0u8; 4];
        queue::peek(q, &mut out, 0).unwrap();
        assert_eq!(u32::from_ne_bytes(out), 0);
        for expected in 0..3u32 {
            queue::receive(q, &mut out, 0).unwrap();
            assert_eq!(u32::from_ne_bytes(out), expected);
        }
        assert_eq!(queue::receive(q, &mut out, 0), Err(OsError::Empty));
        queue::delete(q).unwrap();
    }

    #[test]
    #[serial]
    fn test_full_and_timeout() {
        setup();
        let q = queue::create(1, 2).unwrap();
        queue::send(q, &[1, 2], 0).unwrap();
        assert_eq!(queue::send(q, &[3, 4], 0), Err(OsError::Full));
        assert_eq!(queue::send(q, &[3, 4], 2), Err(OsError::Timeout));
        assert_eq!(queue::send(q, &[1], 0), Err(OsError::InvalidParameter));

        queue::reset(q).unwrap();
        assert_eq!(queue::messages_waiting(q), Ok(0));
        let mut out = [0u8; 2];
        assert_eq!(queue::receive(q, &mut out, 2), Err(OsError::Timeout));
        queue::send(q, &[5, 6], 0).unwrap();
        queue::receive(q, &mut out, 0).unwrap();
        assert_eq!(out, [5, 6]);
        queue::delete(q).unwrap();
    }

    #[test]
    #[serial]
    fn test_blocked_receiver_gets_item() {
        setup();
        let q = queue::create(2, 1).unwrap();
        let receiver = thread::spawn(move || {
            let mut out = [0u8; 1];
            queue::receive(q, &mut out, CFG_MAX_DELAY).map(|_| out[0])
        });
        thread::sleep(Duration::from_millis(30));
        assert_eq!(queue::send_from_isr(q, &[42]), Ok(true));
        assert_eq!(receiver.join().unwrap(), Ok(42));
        queue::delete(q).unwrap();
    }
}

#[cfg(test)]
mod critical_tests {
    use super::*;

    #[test]
    #[serial]
    fn test_nested_enter_exit() {
        setup();
        let mux = PortMux::new();
        assert!(HOSTED.irq_is_enabled());

        for depth in 1..=3 {
            critical::enter(&mux);
            assert_eq!(critical::nesting(), depth);
            assert!(!HOSTED.irq_is_enabled());
        }
        assert_eq!(mux.owner(), HOSTED.thread_current());

        critical::exit(&mux);
        critical::exit(&mux);
        assert_eq!(critical::nesting(), 1);
        assert!(!HOSTED.irq_is_enabled());

        critical::exit(&mux);
        assert_eq!(critical::nesting(), 0);
        assert!(HOSTED.irq_is_enabled());
        assert_eq!(mux.owner(), -1);
    }

    #[test]
    #[serial]
    fn test_restores_masked_state() {
        setup();
        let mux = PortMux::new();
        let outer = critical::enter_nested();
        critical::with_critical(&mux, || {
            assert_eq!(critical::nesting(), 1);
        });
        // interrupts were already off, they stay off
        assert!(!HOSTED.irq_is_enabled());
        critical::exit_nested(outer);
        assert!(HOSTED.irq_is_enabled());
    }

    #[test]
    #[serial]
    fn test_region_excludes_other_tasks() {
        setup();
        static MUX: PortMux = PortMux::new();
        critical::enter(&MUX);
        let other = thread::spawn(|| {
            critical::enter(&MUX);
            let depth = critical::nesting();
            critical::exit(&MUX);
            depth
        });
        thread::sleep(Duration::from_millis(30));
        assert!(!other.is_finished());
        critical::exit(&MUX);
        // depth is counted per task
        assert_eq!(other.join().unwrap(), 1);
    }

    #[test]
    #[serial]
    fn test_interleaved_regions() {
        setup();
        let a = PortMux::new();
        let b = PortMux::new();
        critical::enter(&a);
        critical::enter(&b);
        assert_eq!(critical::nesting(), 2);

        // releasing the outer region first still keeps interrupts masked
        critical::exit(&a);
        assert_eq!(critical::nesting(), 1);
        assert!(!HOSTED.irq_is_enabled());
        assert_eq!(a.owner(), -1);
        assert_eq!(b.owner(), HOSTED.thread_current());

        critical::exit(&b);
        assert_eq!(critical::nesting(), 0);
        assert!(HOSTED.irq_is_enabled());
        assert_eq!(b.owner(), -1);
    }

    #[test]
    #[serial]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "critical section exit without enter")]
    fn test_unmatched_exit_asserts() {
        setup();
        let mux = PortMux::new();
        critical::exit(&mux);
    }

    #[test]
    #[serial]
    fn test_not_in_isr() {
        setup();
        assert!(!critical::is_isr_context());
    }
}

#[cfg(test)]
mod task_tests {
    use super::*;

    static RUNS: AtomicU32 = AtomicU32::new(0);

    fn signal_and_return(arg: *mut ()) {
        RUNS.fetch_add(1, Ordering::SeqCst);
        if let Some(done) = SemaphoreHandle::from_raw(arg as usize as u32) {
            let _ = sync::give(done);
        }
    }

    fn signal_and_delete(arg: *mut ()) {
        signal_and_return(arg);
        task::delete(None);
    }

    fn park(arg: *mut ()) {
        if let Some(gate) = SemaphoreHandle::from_raw(arg as usize as u32) {
            let _ = sync::take(gate, CFG_MAX_DELAY);
        }
    }

    fn as_arg(handle: SemaphoreHandle) -> *mut () {
        handle.raw() as usize as *mut ()
    }

    #[test]
    #[serial]
    fn test_create_runs_entry() {
        setup();
        let done = sync::create_binary_semaphore().unwrap();
        let before = RUNS.load(Ordering::SeqCst);
        let t = task::create(signal_and_return, "runner", 1024, as_arg(done), 3).unwrap();
        assert!(t.id() > 0);
        sync::take(done, 100).unwrap();
        assert_eq!(RUNS.load(Ordering::SeqCst), before + 1);
        assert!(wait_until(|| !task::is_alive(t)));
        sync::delete(done).unwrap();
    }

    #[test]
    #[serial]
    fn test_priority_and_name() {
        setup();
        let gate = sync::create_binary_semaphore().unwrap();
        let t = task::create(park, "a-rather-long-task-name", 1024, as_arg(gate), 5).unwrap();
        assert_eq!(task::priority(t), Ok(prio::to_host(5)));
        assert_eq!(task::name(t).unwrap().as_str(), "a-rather-long-ta");
        assert!(task::is_alive(t));

        sync::give(gate).unwrap();
        assert!(wait_until(|| !task::is_alive(t)));
        assert_eq!(task::priority(t), Err(OsError::InvalidHandle));
        sync::delete(gate).unwrap();
    }

    #[test]
    #[serial]
    fn test_self_delete_frees_slot() {
        setup();
        let done = sync::create_binary_semaphore().unwrap();
        let live = task::count();
        let t = task::create(signal_and_delete, "selfdel", 1024, as_arg(done), 2).unwrap();
        sync::take(done, 100).unwrap();
        assert!(wait_until(|| !task::is_alive(t)));
        assert!(wait_until(|| task::count() == live));

        // the pid and slot come back for the next task
        assert!(wait_until(|| {
            task::create(signal_and_delete, "again", 1024, as_arg(done), 2).is_ok()
        }));
        sync::take(done, 100).unwrap();
        sync::delete(done).unwrap();
    }

    #[test]
    #[serial]
    fn test_self_delete_on_foreign_thread_panics() {
        setup();
        let outcome = thread::spawn(|| {
            task::delete(None);
        })
        .join();
        let payload = outcome.unwrap_err();
        let message = payload.downcast_ref::<String>().unwrap();
        assert!(message.contains("unsupported operation"));
    }

    #[test]
    #[serial]
    fn test_create_static() {
        setup();
        let done = sync::create_binary_semaphore().unwrap();
        let stack: &'static mut [u8] = Box::leak(vec![0u8; 2048].into_boxed_slice());
        let t = task::create_static(signal_and_return, "static", Some(stack), 2048, as_arg(done), 1);
        assert!(t.is_some());
        sync::take(done, 100).unwrap();

        assert_eq!(
            task::create_static(signal_and_return, "nostack", None, 2048, as_arg(done), 1),
            None
        );
        let small: &'static mut [u8] = Box::leak(vec![0u8; 64].into_boxed_slice());
        assert_eq!(
            task::create_static(signal_and_return, "small", Some(small), 128, as_arg(done), 1),
            None
        );
        sync::delete(done).unwrap();
    }

    #[test]
    #[serial]
    fn test_oversized_stack_fails() {
        setup();
        assert_eq!(
            task::create(park, "huge", usize::MAX, std::ptr::null_mut(), 1).map(TaskHandle::id),
            Err(OsError::NoMemory)
        );
    }

    #[test]
    #[serial]
    fn test_deleting_other_task_panics() {
        setup();
        let gate = sync::create_binary_semaphore().unwrap();
        let t = task::create(park, "victim", 1024, as_arg(gate), 1).unwrap();

        let outcome = thread::spawn(move || {
            task::delete(Some(t));
        })
        .join();
        assert!(outcome.is_err());
        assert!(task::is_alive(t));

        sync::give(gate).unwrap();
        assert!(wait_until(|| !task::is_alive(t)));
        sync::delete(gate).unwrap();
    }
}

#[cfg(test)]
mod timer_tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    static PERIODIC: AtomicU32 = AtomicU32::new(0);
    static ONE_SHOT: AtomicU32 = AtomicU32::new(0);
    static SERVICE_RAN: AtomicU32 = AtomicU32::new(0);

    fn count_periodic(_: TimerHandle) {
        PERIODIC.fetch_add(1, Ordering::SeqCst);
    }

    fn count_one_shot(timer: TimerHandle) {
        ONE_SHOT.fetch_add(1, Ordering::SeqCst);
        let id = timer::get_id(timer).unwrap();
        assert_eq!(id as usize, 0xabc);
        let on_service = timer::service_handle() == Some(task::current_handle());
        if on_service {
            SERVICE_RAN.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    #[serial]
    fn test_periodic_timer() {
        setup();
        PERIODIC.store(0, Ordering::SeqCst);
        let t = timer::create("tick", 2, true, std::ptr::null_mut(), count_periodic).unwrap();
        assert_eq!(timer::is_active(t), Ok(false));
        timer::start(t, 0).unwrap();
        assert!(timer::is_active(t).unwrap());

        assert!(wait_until(|| PERIODIC.load(Ordering::SeqCst) >= 3));
        assert!(timer::is_active(t).unwrap());

        timer::stop(t, 0).unwrap();
        assert_eq!(timer::is_active(t), Ok(false));
        thread::sleep(Duration::from_millis(50));
        let settled = PERIODIC.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(80));
        assert_eq!(PERIODIC.load(Ordering::SeqCst), settled);

        timer::delete(t, 0).unwrap();
        assert_eq!(timer::is_active(t), Err(OsError::InvalidHandle));
    }

    #[test]
    #[serial]
    fn test_one_shot_timer() {
        setup();
        ONE_SHOT.store(0, Ordering::SeqCst);
        SERVICE_RAN.store(0, Ordering::SeqCst);
        let t = timer::create("once", 3, false, 0xabc as *mut (), count_one_shot).unwrap();
        assert_eq!(timer::is_auto_reload(t), Ok(false));
        assert_eq!(timer::name(t).unwrap().as_str(), "once");
        timer::start(t, 0).unwrap();

        assert!(wait_until(|| ONE_SHOT.load(Ordering::SeqCst) == 1));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(ONE_SHOT.load(Ordering::SeqCst), 1);
        assert_eq!(SERVICE_RAN.load(Ordering::SeqCst), 1);
        assert_eq!(timer::is_active(t), Ok(false));

        // restart fires once more
        timer::reset(t, 0).unwrap();
        assert!(wait_until(|| ONE_SHOT.load(Ordering::SeqCst) == 2));
        timer::delete(t, 0).unwrap();
    }

    static RESTARTED: AtomicU32 = AtomicU32::new(0);

    fn count_restarted(_: TimerHandle) {
        RESTARTED.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    #[serial]
    fn test_restart_while_expiry_in_flight() {
        setup();
        RESTARTED.store(0, Ordering::SeqCst);
        let t = timer::create("restart", 3, false, std::ptr::null_mut(), count_restarted).unwrap();
        timer::start(t, 0).unwrap();
        // the first expiry stalls on the held section, the restart lands before it completes
        critical_section::with(|_| {
            thread::sleep(Duration::from_millis(60));
            timer::start(t, 0).unwrap();
        });

        assert!(wait_until(|| RESTARTED.load(Ordering::SeqCst) == 2));
        thread::sleep(Duration::from_millis(60));
        assert_eq!(RESTARTED.load(Ordering::SeqCst), 2);
        assert_eq!(timer::is_active(t), Ok(false));
        timer::delete(t, 0).unwrap();
    }

    static SLOW_CALLS: Mutex<Vec<Instant>> = Mutex::new(Vec::new());

    fn slow_first_call(_: TimerHandle) {
        let first = {
            let mut calls = SLOW_CALLS.lock().unwrap();
            calls.push(Instant::now());
            calls.len() == 1
        };
        if first {
            thread::sleep(Duration::from_millis(150));
        }
    }

    #[test]
    #[serial]
    fn test_auto_reload_rearms_before_callback() {
        setup();
        SLOW_CALLS.lock().unwrap().clear();
        let t = timer::create("slow", 2, true, std::ptr::null_mut(), slow_first_call).unwrap();
        timer::start(t, 0).unwrap();
        assert!(wait_until(|| SLOW_CALLS.lock().unwrap().len() >= 5));
        timer::stop(t, 0).unwrap();
        timer::delete(t, 0).unwrap();

        // expiries kept coming during the slow call and queued up behind it
        let calls = SLOW_CALLS.lock().unwrap();
        assert!(calls[1] - calls[0] >= Duration::from_millis(150));
        assert!(calls[4] - calls[1] < Duration::from_millis(20));
    }

    #[test]
    #[serial]
    fn test_timer_parameters() {
        setup();
        assert_eq!(
            timer::create("zero", 0, false, std::ptr::null_mut(), count_periodic),
            Err(OsError::InvalidParameter)
        );
        let t = timer::create("params", 50, true, std::ptr::null_mut(), count_periodic).unwrap();
        assert_eq!(timer::period(t), Ok(50));
        timer::change_period(t, 70, 0).unwrap();
        assert_eq!(timer::period(t), Ok(70));
        assert!(timer::is_active(t).unwrap());
        assert_eq!(timer::change_period(t, 0, 0), Err(OsError::InvalidParameter));

        timer::set_id(t, 7 as *mut ()).unwrap();
        assert_eq!(timer::get_id(t).map(|id| id as usize), Ok(7));
        timer::delete(t, 0).unwrap();
        assert_eq!(timer::delete(t, 0), Err(OsError::InvalidHandle));
    }
}
