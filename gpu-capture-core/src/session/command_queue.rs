use std::ops::Deref;

use crate::models::chunk::ChunkType;
use crate::models::descriptors::CommandQueueDesc;
use crate::models::error::CaptureError;
use crate::traits::real_api::RealCommandQueue;

use super::command_list::WrappedCommandList;
use super::objects::{DeviceChild, WrappedObject};

/// A wrapped command queue.
pub struct WrappedCommandQueue {
    child: DeviceChild<dyn RealCommandQueue>,
    desc: CommandQueueDesc,
}

impl WrappedCommandQueue {
    pub(crate) fn new(child: DeviceChild<dyn RealCommandQueue>, desc: CommandQueueDesc) -> Self {
        Self { child, desc }
    }

    pub fn desc(&self) -> &CommandQueueDesc {
        &self.desc
    }

    /// Submit closed lists. Recorded as the queue id followed by the list ids
    /// in submission order.
    pub fn execute_command_lists(&self, lists: &[&WrappedCommandList]) -> Result<(), CaptureError> {
        let reals = lists
            .iter()
            .map(|list| list.real())
            .collect::<Result<Vec<_>, _>>()?;
        self.child.intercept(
            ChunkType::ExecuteCmdLists,
            |real, _| {
                real.execute_command_lists(&reals);
                Ok(())
            },
            |_, w| {
                w.write_count(lists.len());
                for list in lists {
                    w.put(&list.id());
                }
                Ok(())
            },
        )
    }

    pub fn signal(&self, fence: &WrappedObject, value: u64) -> Result<(), CaptureError> {
        let real_fence = fence.real()?;
        self.child.intercept(
            ChunkType::Signal,
            |real, _| real.signal(&real_fence, value),
            |_, w| {
                w.put(&fence.id());
                w.write_u64(value);
                Ok(())
            },
        )
    }
}

impl Deref for WrappedCommandQueue {
    type Target = DeviceChild<dyn RealCommandQueue>;

    fn deref(&self) -> &Self::Target {
        &self.child
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::descriptors::{CommandListType, ResourceId};
    use crate::processing::chunk_stream::read_capture;
    use crate::processing::serialiser::PayloadReader;
    use crate::test_support::fake_device;

    fn direct_queue_desc() -> CommandQueueDesc {
        CommandQueueDesc {
            queue_type: CommandListType::Direct,
            priority: 0,
            flags: 0,
            node_mask: 0,
        }
    }

    #[test]
    fn submission_and_signal_are_recorded() {
        let (device, journal, sink) = fake_device();
        let queue = device.create_command_queue(&direct_queue_desc()).unwrap();
        let allocator = device.create_command_allocator(CommandListType::Direct).unwrap();
        let first = device
            .create_command_list(0, CommandListType::Direct, &allocator, None)
            .unwrap();
        let second = device
            .create_command_list(0, CommandListType::Direct, &allocator, None)
            .unwrap();
        let fence = device.create_fence(0, 0).unwrap();

        device.begin_capture().unwrap();
        queue.execute_command_lists(&[&*first, &*second]).unwrap();
        queue.signal(&fence, 1).unwrap();
        device.end_capture().unwrap();

        assert!(journal.calls().contains(&"queue.execute_command_lists 2".to_string()));
        assert!(journal.calls().contains(&"queue.signal 1".to_string()));

        let stream = read_capture(&sink.captures()[0].bytes).unwrap();
        let (_, execute) = stream
            .known_chunks()
            .find(|(ty, _)| *ty == ChunkType::ExecuteCmdLists)
            .unwrap();
        let mut r = PayloadReader::new(&execute.payload);
        assert_eq!(r.get::<ResourceId>().unwrap(), queue.id());
        assert_eq!(r.read_count(8).unwrap(), 2);
        assert_eq!(r.get::<ResourceId>().unwrap(), first.id());
        assert_eq!(r.get::<ResourceId>().unwrap(), second.id());
        assert!(r.finish().is_ok());

        let (_, signal) = stream
            .known_chunks()
            .find(|(ty, _)| *ty == ChunkType::Signal)
            .unwrap();
        let mut r = PayloadReader::new(&signal.payload);
        assert_eq!(r.get::<ResourceId>().unwrap(), queue.id());
        assert_eq!(r.get::<ResourceId>().unwrap(), fence.id());
        assert_eq!(r.read_u64().unwrap(), 1);
    }

    #[test]
    fn failed_signal_is_returned_and_not_recorded() {
        let (device, journal, sink) = fake_device();
        let queue = device.create_command_queue(&direct_queue_desc()).unwrap();
        let fence = device.create_fence(0, 0).unwrap();

        device.begin_capture().unwrap();
        journal.fail_calls(true);
        assert!(matches!(
            queue.signal(&fence, 3),
            Err(CaptureError::RealCallFailed(_))
        ));
        journal.fail_calls(false);
        device.end_capture().unwrap();

        let stream = read_capture(&sink.captures()[0].bytes).unwrap();
        assert!(stream.known_chunks().all(|(ty, _)| ty != ChunkType::Signal));
    }

    #[test]
    fn submitting_destroyed_list_fails() {
        let (device, _journal, _sink) = fake_device();
        let queue = device.create_command_queue(&direct_queue_desc()).unwrap();
        let allocator = device.create_command_allocator(CommandListType::Direct).unwrap();
        let list = device
            .create_command_list(0, CommandListType::Direct, &allocator, None)
            .unwrap();
        list.release();
        assert_eq!(
            queue.execute_command_lists(&[&*list]),
            Err(CaptureError::ObjectDestroyed)
        );
        assert_eq!(queue.desc().queue_type, CommandListType::Direct);
    }
}
