use super::{flag, BaseType_t, TickType_t, UBaseType_t};
use crate::critical::{self, PortMux};
use crate::time;
use crate::types::IrqState;

/// Critical section region
pub type portMUX_TYPE = PortMux;

pub const portMUX_INITIALIZER_UNLOCKED: portMUX_TYPE = PortMux::new();

pub fn vTaskEnterCritical(mux: &portMUX_TYPE) {
    critical::enter(mux);
}

pub fn vTaskExitCritical(mux: &portMUX_TYPE) {
    critical::exit(mux);
}

/// Take only the region lock, interrupts stay as they are
pub fn portENTER_CRITICAL(mux: &portMUX_TYPE) {
    mux.acquire();
}

pub fn portEXIT_CRITICAL(mux: &portMUX_TYPE) {
    mux.release();
}

/// Full critical section, usable from interrupt handlers
pub fn portENTER_CRITICAL_ISR(mux: &portMUX_TYPE) {
    critical::enter(mux);
}

pub fn portEXIT_CRITICAL_ISR(mux: &portMUX_TYPE) {
    critical::exit(mux);
}

pub fn taskENTER_CRITICAL(mux: &portMUX_TYPE) {
    portENTER_CRITICAL(mux);
}

pub fn taskEXIT_CRITICAL(mux: &portMUX_TYPE) {
    portEXIT_CRITICAL(mux);
}

pub fn taskENTER_CRITICAL_ISR(mux: &portMUX_TYPE) {
    portENTER_CRITICAL_ISR(mux);
}

pub fn taskEXIT_CRITICAL_ISR(mux: &portMUX_TYPE) {
    portEXIT_CRITICAL_ISR(mux);
}

/// Mask interrupts, returning the previous mask
pub fn portENTER_CRITICAL_NESTED() -> UBaseType_t {
    critical::enter_nested().0 as UBaseType_t
}

pub fn portEXIT_CRITICAL_NESTED(state: UBaseType_t) {
    critical::exit_nested(IrqState(state as usize));
}

pub fn vPortCPUAcquireMutex(mux: &portMUX_TYPE) {
    mux.acquire();
}

pub fn vPortCPUReleaseMutex(mux: &portMUX_TYPE) {
    mux.release();
}

pub fn xPortInIsrContext() -> BaseType_t {
    flag(critical::is_isr_context())
}

pub fn xPortGetCoreID() -> BaseType_t {
    time::core_id() as BaseType_t
}

pub fn xPortGetTickRateHz() -> u32 {
    time::tick_rate_hz()
}

/// Milliseconds to ticks
pub const fn pdMS_TO_TICKS(ms: u32) -> TickType_t {
    time::ms_to_ticks(ms)
}

pub const fn portTICK_RATE_MS(ms: u32) -> TickType_t {
    time::ms_to_ticks(ms)
}
