use super::{
    errQUEUE_EMPTY, errQUEUE_FULL, pdFAIL, pdPASS, woken, BaseType_t, TickType_t, UBaseType_t,
};
use crate::error::{OsError, OsResult};
use crate::sync::queue::{self, QueueHandle};
use crate::sync;

pub type QueueHandle_t = Option<QueueHandle>;

pub const queueSEND_TO_BACK: BaseType_t = 0;
pub const queueSEND_TO_FRONT: BaseType_t = 1;
pub const queueOVERWRITE: BaseType_t = 2;

fn resolve(handle: impl Into<QueueHandle_t>) -> OsResult<QueueHandle> {
    handle.into().ok_or(OsError::InvalidHandle)
}

fn sent(result: OsResult<()>) -> BaseType_t {
    match result {
        Ok(()) => pdPASS,
        Err(_) => errQUEUE_FULL,
    }
}

fn received(result: OsResult<()>) -> BaseType_t {
    match result {
        Ok(()) => pdPASS,
        Err(_) => errQUEUE_EMPTY,
    }
}

pub fn xQueueCreate(uxQueueLength: UBaseType_t, uxItemSize: UBaseType_t) -> QueueHandle_t {
    queue::create(uxQueueLength as usize, uxItemSize as usize).ok()
}

/// Counting semaphore, same as `xSemaphoreCreateCounting`
pub fn xQueueCreateCountingSemaphore(
    uxMaxCount: UBaseType_t,
    uxInitialCount: UBaseType_t,
) -> QueueHandle_t {
    sync::create_counting_semaphore(uxMaxCount, uxInitialCount).ok()
}

pub fn vQueueDelete(xQueue: impl Into<QueueHandle_t>) {
    if let Ok(handle) = resolve(xQueue) {
        let _ = queue::delete(handle);
    }
}

/// Send with an explicit position
///
/// `queueOVERWRITE` is not supported and fails like a full queue.
pub fn xQueueGenericSend(
    xQueue: impl Into<QueueHandle_t>,
    pvItemToQueue: &[u8],
    xTicksToWait: TickType_t,
    xCopyPosition: BaseType_t,
) -> BaseType_t {
    let result = resolve(xQueue).and_then(|q| match xCopyPosition {
        queueSEND_TO_BACK => queue::send_to_back(q, pvItemToQueue, xTicksToWait),
        queueSEND_TO_FRONT => queue::send_to_front(q, pvItemToQueue, xTicksToWait),
        _ => Err(OsError::UnsupportedOperation),
    });
    sent(result)
}

pub fn xQueueSend(
    xQueue: impl Into<QueueHandle_t>,
    pvItemToQueue: &[u8],
    xTicksToWait: TickType_t,
) -> BaseType_t {
    xQueueGenericSend(xQueue, pvItemToQueue, xTicksToWait, queueSEND_TO_BACK)
}

pub fn xQueueSendToBack(
    xQueue: impl Into<QueueHandle_t>,
    pvItemToQueue: &[u8],
    xTicksToWait: TickType_t,
) -> BaseType_t {
    xQueueGenericSend(xQueue, pvItemToQueue, xTicksToWait, queueSEND_TO_BACK)
}

pub fn xQueueSendToFront(
    xQueue: impl Into<QueueHandle_t>,
    pvItemToQueue: &[u8],
    xTicksToWait: TickType_t,
) -> BaseType_t {
    xQueueGenericSend(xQueue, pvItemToQueue, xTicksToWait, queueSEND_TO_FRONT)
}

/// Receive or peek, depending on `xJustPeeking`
pub fn xQueueGenericReceive(
    xQueue: impl Into<QueueHandle_t>,
    pvBuffer: &mut [u8],
    xTicksToWait: TickType_t,
    xJustPeeking: BaseType_t,
) -> BaseType_t {
    let result = resolve(xQueue).and_then(|q| {
        if xJustPeeking != 0 {
            queue::peek(q, pvBuffer, xTicksToWait)
        } else {
            queue::receive(q, pvBuffer, xTicksToWait)
        }
    });
    received(result)
}

pub fn xQueueReceive(
    xQueue: impl Into<QueueHandle_t>,
    pvBuffer: &mut [u8],
    xTicksToWait: TickType_t,
) -> BaseType_t {
    xQueueGenericReceive(xQueue, pvBuffer, xTicksToWait, 0)
}

pub fn xQueuePeek(
    xQueue: impl Into<QueueHandle_t>,
    pvBuffer: &mut [u8],
    xTicksToWait: TickType_t,
) -> BaseType_t {
    xQueueGenericReceive(xQueue, pvBuffer, xTicksToWait, 1)
}

pub fn xQueueGenericSendFromISR(
    xQueue: impl Into<QueueHandle_t>,
    pvItemToQueue: &[u8],
    pxHigherPriorityTaskWoken: Option<&mut BaseType_t>,
    xCopyPosition: BaseType_t,
) -> BaseType_t {
    if xCopyPosition != queueSEND_TO_BACK {
        return errQUEUE_FULL;
    }
    let result = resolve(xQueue).and_then(|q| queue::send_from_isr(q, pvItemToQueue));
    sent(woken(result, pxHigherPriorityTaskWoken))
}

pub fn xQueueSendFromISR(
    xQueue: impl Into<QueueHandle_t>,
    pvItemToQueue: &[u8],
    pxHigherPriorityTaskWoken: Option<&mut BaseType_t>,
) -> BaseType_t {
    xQueueGenericSendFromISR(
        xQueue,
        pvItemToQueue,
        pxHigherPriorityTaskWoken,
        queueSEND_TO_BACK,
    )
}

pub fn xQueueReceiveFromISR(
    xQueue: impl Into<QueueHandle_t>,
    pvBuffer: &mut [u8],
    pxHigherPriorityTaskWoken: Option<&mut BaseType_t>,
) -> BaseType_t {
    let result = resolve(xQueue).and_then(|q| queue::receive_from_isr(q, pvBuffer));
    received(woken(result, pxHigherPriorityTaskWoken))
}

/// Give a semaphore from an interrupt handler
pub fn xQueueGiveFromISR(
    xQueue: impl Into<QueueHandle_t>,
    pxHigherPriorityTaskWoken: Option<&mut BaseType_t>,
) -> BaseType_t {
    let result = resolve(xQueue).and_then(sync::give_from_isr);
    sent(woken(result, pxHigherPriorityTaskWoken))
}

/// Queued items, or the count of a semaphore
pub fn uxQueueMessagesWaiting(xQueue: impl Into<QueueHandle_t>) -> UBaseType_t {
    resolve(xQueue).and_then(sync::get_count).unwrap_or(0)
}

pub fn uxQueueSpacesAvailable(xQueue: impl Into<QueueHandle_t>) -> UBaseType_t {
    resolve(xQueue)
        .and_then(queue::spaces_available)
        .map_or(0, |n| n as UBaseType_t)
}

/// Empty a queue, always passes for a valid queue
pub fn xQueueGenericReset(xQueue: impl Into<QueueHandle_t>, _xNewQueue: BaseType_t) -> BaseType_t {
    match resolve(xQueue).and_then(queue::reset) {
        Ok(()) => pdPASS,
        Err(_) => pdFAIL,
    }
}

pub fn xQueueReset(xQueue: impl Into<QueueHandle_t>) -> BaseType_t {
    xQueueGenericReset(xQueue, 0)
}
