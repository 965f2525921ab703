use super::{
    errCOULD_NOT_ALLOCATE_REQUIRED_MEMORY, pdPASS, BaseType_t, StackType_t, TickType_t,
    UBaseType_t,
};
use crate::task::{self, TaskHandle};
use crate::types::TaskFn;

pub type TaskHandle_t = Option<TaskHandle>;
pub type TaskFunction_t = TaskFn;

/// Any core
pub const tskNO_AFFINITY: BaseType_t = i32::MAX;

/// Control block storage of `xTaskCreateStatic`, never used
#[derive(Debug, Default)]
pub struct StaticTask_t {
    _reserved: (),
}

/// Create a task with a heap-allocated stack of `usStackDepth` bytes
pub fn xTaskCreate(
    pvTaskCode: TaskFunction_t,
    pcName: &str,
    usStackDepth: u32,
    pvParameters: *mut (),
    uxPriority: UBaseType_t,
    pxCreatedTask: Option<&mut TaskHandle_t>,
) -> BaseType_t {
    xTaskCreatePinnedToCore(
        pvTaskCode,
        pcName,
        usStackDepth,
        pvParameters,
        uxPriority,
        pxCreatedTask,
        tskNO_AFFINITY,
    )
}

/// [`xTaskCreate`], the core hint is ignored
pub fn xTaskCreatePinnedToCore(
    pvTaskCode: TaskFunction_t,
    pcName: &str,
    usStackDepth: u32,
    pvParameters: *mut (),
    uxPriority: UBaseType_t,
    pxCreatedTask: Option<&mut TaskHandle_t>,
    xCoreID: BaseType_t,
) -> BaseType_t {
    let created = task::create_pinned(
        pvTaskCode,
        pcName,
        usStackDepth as usize,
        pvParameters,
        uxPriority,
        xCoreID as u32,
    );
    let handle = created.ok();
    if let Some(out) = pxCreatedTask {
        *out = handle;
    }
    match handle {
        Some(_) => pdPASS,
        None => errCOULD_NOT_ALLOCATE_REQUIRED_MEMORY,
    }
}

/// Create a task on the caller's stack buffer of `ulStackDepth` bytes
pub fn xTaskCreateStatic(
    pvTaskCode: TaskFunction_t,
    pcName: &str,
    ulStackDepth: u32,
    pvParameters: *mut (),
    uxPriority: UBaseType_t,
    puxStackBuffer: Option<&'static mut [StackType_t]>,
    _pxTaskBuffer: Option<&mut StaticTask_t>,
) -> TaskHandle_t {
    task::create_static(
        pvTaskCode,
        pcName,
        puxStackBuffer,
        ulStackDepth as usize,
        pvParameters,
        uxPriority,
    )
}

/// Delete the calling task (`None` or its own handle)
///
/// Deleting any other task panics.
pub fn vTaskDelete(xTaskToDelete: TaskHandle_t) -> ! {
    task::delete(xTaskToDelete)
}

pub fn vTaskDelay(xTicksToDelay: TickType_t) {
    if let Err(e) = task::delay(xTicksToDelay) {
        crate::warn!("vTaskDelay: {}", e.code());
    }
}

pub fn xTaskGetCurrentTaskHandle() -> TaskHandle_t {
    Some(task::current_handle())
}

pub fn xTaskGetTickCount() -> TickType_t {
    task::tick_count().unwrap_or(0)
}
