use crate::error::GpuError;
use crate::gpu::backend::READBACK_HEADER_BYTES;
use crate::mesh::Triangle;
use crossbeam_channel::{Receiver, Sender, TryRecvError};

type ReadbackResult = Result<Vec<Triangle>, GpuError>;

/// A one-shot channel carrying the triangles of one dispatch.
pub fn readback_channel() -> (ReadbackSender, Readback) {
	let (sender, receiver) = crossbeam_channel::bounded(1);
	(ReadbackSender { sender }, Readback { receiver })
}

/// Completion side, moved into the device callback.
pub struct ReadbackSender {
	sender: Sender<ReadbackResult>,
}

impl ReadbackSender {
	pub fn complete(self, result: ReadbackResult) {
		if self.sender.send(result).is_err() {
			log::debug!("Readback arrived after its chunk was dropped; discarding");
		}
	}
}

/// Polling side, held by the extractor.
#[derive(Debug)]
pub struct Readback {
	receiver: Receiver<ReadbackResult>,
}

impl Readback {
	/// Takes the result if it has arrived. Never blocks.
	pub fn try_take(&self) -> Option<ReadbackResult> {
		match self.receiver.try_recv() {
			Ok(result) => Some(result),
			Err(TryRecvError::Empty) => None,
			Err(TryRecvError::Disconnected) => Some(Err(GpuError::ReadbackDisconnected)),
		}
	}
}

/// Clamps an append counter to the output capacity.
pub fn clamp_count(count: usize, capacity: usize) -> usize {
	if count > capacity {
		log::warn!(
			"Kernel appended {} triangles but the output holds {}; dropping the overflow",
			count,
			capacity
		);
		capacity
	} else {
		count
	}
}

/// Decodes a staging buffer: the counter word, padding up to [`READBACK_HEADER_BYTES`], then
/// packed triangle records.
pub fn decode_triangles(bytes: &[u8], capacity: usize) -> ReadbackResult {
	let Some(counter) = bytes.get(..4) else {
		return Err(GpuError::Readback(format!(
			"staging buffer holds {} bytes, expected a {} byte header",
			bytes.len(),
			READBACK_HEADER_BYTES
		)));
	};
	let count = u32::from_le_bytes([counter[0], counter[1], counter[2], counter[3]]) as usize;
	let count = clamp_count(count, capacity);

	let record = std::mem::size_of::<Triangle>();
	let end = READBACK_HEADER_BYTES + count * record;
	let records = bytes.get(READBACK_HEADER_BYTES..end).ok_or_else(|| {
		GpuError::Readback(format!(
			"staging buffer holds {} bytes, {} triangles need {}",
			bytes.len(),
			count,
			end
		))
	})?;

	Ok(records.chunks_exact(record).map(bytemuck::pod_read_unaligned::<Triangle>).collect())
}
