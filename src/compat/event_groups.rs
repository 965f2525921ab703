use super::{BaseType_t, TickType_t};
use crate::event_groups::{self, EventBits, EventGroupHandle};

pub type EventGroupHandle_t = EventGroupHandle;
pub type EventBits_t = EventBits;

/// Panics, event groups are not supported
pub fn xEventGroupCreate() -> EventGroupHandle_t {
    event_groups::create()
}

pub fn vEventGroupDelete(xEventGroup: EventGroupHandle_t) {
    event_groups::delete(xEventGroup)
}

pub fn xEventGroupSetBits(xEventGroup: EventGroupHandle_t, uxBitsToSet: EventBits_t) -> EventBits_t {
    event_groups::set_bits(xEventGroup, uxBitsToSet)
}

pub fn xEventGroupClearBits(
    xEventGroup: EventGroupHandle_t,
    uxBitsToClear: EventBits_t,
) -> EventBits_t {
    event_groups::clear_bits(xEventGroup, uxBitsToClear)
}

pub fn xEventGroupWaitBits(
    xEventGroup: EventGroupHandle_t,
    uxBitsToWaitFor: EventBits_t,
    xClearOnExit: BaseType_t,
    xWaitForAllBits: BaseType_t,
    xTicksToWait: TickType_t,
) -> EventBits_t {
    event_groups::wait_bits(
        xEventGroup,
        uxBitsToWaitFor,
        xClearOnExit != 0,
        xWaitForAllBits != 0,
        xTicksToWait,
    )
}
