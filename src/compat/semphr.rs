use super::{pass, woken, BaseType_t, TickType_t, UBaseType_t};
use crate::error::OsError;
use crate::sync::{self, SemaphoreHandle};

pub type SemaphoreHandle_t = Option<SemaphoreHandle>;

fn resolve(handle: impl Into<SemaphoreHandle_t>) -> Result<SemaphoreHandle, OsError> {
    handle.into().ok_or(OsError::InvalidHandle)
}

pub fn xSemaphoreCreateMutex() -> SemaphoreHandle_t {
    sync::create_mutex().ok()
}

pub fn xSemaphoreCreateRecursiveMutex() -> SemaphoreHandle_t {
    sync::create_recursive_mutex().ok()
}

pub fn xSemaphoreCreateBinary() -> SemaphoreHandle_t {
    sync::create_binary_semaphore().ok()
}

pub fn xSemaphoreCreateCounting(
    uxMaxCount: UBaseType_t,
    uxInitialCount: UBaseType_t,
) -> SemaphoreHandle_t {
    sync::create_counting_semaphore(uxMaxCount, uxInitialCount).ok()
}

pub fn vSemaphoreDelete(xSemaphore: impl Into<SemaphoreHandle_t>) {
    if let Ok(handle) = resolve(xSemaphore) {
        let _ = sync::delete(handle);
    }
}

pub fn xSemaphoreGive(xSemaphore: impl Into<SemaphoreHandle_t>) -> BaseType_t {
    pass(resolve(xSemaphore).and_then(sync::give))
}

pub fn xSemaphoreTake(
    xSemaphore: impl Into<SemaphoreHandle_t>,
    xTicksToWait: TickType_t,
) -> BaseType_t {
    pass(resolve(xSemaphore).and_then(|h| sync::take(h, xTicksToWait)))
}

pub fn xSemaphoreGiveRecursive(xSemaphore: impl Into<SemaphoreHandle_t>) -> BaseType_t {
    pass(resolve(xSemaphore).and_then(sync::give_recursive))
}

pub fn xSemaphoreTakeRecursive(
    xSemaphore: impl Into<SemaphoreHandle_t>,
    xTicksToWait: TickType_t,
) -> BaseType_t {
    pass(resolve(xSemaphore).and_then(|h| sync::take_recursive(h, xTicksToWait)))
}

pub fn uxSemaphoreGetCount(xSemaphore: impl Into<SemaphoreHandle_t>) -> UBaseType_t {
    resolve(xSemaphore).and_then(sync::get_count).unwrap_or(0)
}

pub fn xSemaphoreGiveFromISR(
    xSemaphore: impl Into<SemaphoreHandle_t>,
    pxHigherPriorityTaskWoken: Option<&mut BaseType_t>,
) -> BaseType_t {
    let result = resolve(xSemaphore).and_then(sync::give_from_isr);
    pass(woken(result, pxHigherPriorityTaskWoken))
}

pub fn xSemaphoreTakeFromISR(
    xSemaphore: impl Into<SemaphoreHandle_t>,
    pxHigherPriorityTaskWoken: Option<&mut BaseType_t>,
) -> BaseType_t {
    let result = resolve(xSemaphore).and_then(sync::take_from_isr);
    pass(woken(result, pxHigherPriorityTaskWoken))
}
