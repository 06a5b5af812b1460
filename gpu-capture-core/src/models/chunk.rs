use super::error::CaptureError;

/// First id handed to a capture chunk type. Ids below it belong to the
/// transport and never appear as a [`ChunkType`].
pub const FIRST_CHUNK_ID: u32 = 1000;

/// The closed set of operation kinds that can appear in a capture log.
///
/// Ids are contiguous from [`FIRST_CHUNK_ID`] and are part of the log format:
/// new kinds are only ever added directly before `NumChunks`, never inserted
/// or reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum ChunkType {
    DeviceInit = FIRST_CHUNK_ID,
    SetResourceName,
    ReleaseResource,
    CreateSwapBuffer,

    CaptureScope,

    PushEvent,
    SetMarker,
    PopEvent,

    DebugMessages,

    ContextCaptureHeader,
    ContextCaptureFooter,

    SetShaderDebugPath,

    CreateCommandQueue,
    CreateCommandAllocator,
    CreateCommandList,

    CreateGraphicsPipe,
    CreateComputePipe,
    CreateDescriptorHeap,
    CreateRootSig,

    CreateCommittedResource,

    CreateFence,

    CloseList,
    ResetList,

    ResourceBarrier,

    DrawIndexedInst,
    CopyBuffer,

    ClearRtv,

    SetTopology,
    SetIBuffer,
    SetVBuffers,
    SetViewports,
    SetScissors,
    SetPipe,
    SetRtvs,
    SetGfxRootSig,
    SetGfxRootCbv,

    ExecuteCmdLists,
    Signal,

    /// Count of real kinds. Never emitted.
    NumChunks,
}

impl ChunkType {
    /// Every emittable kind, in id order.
    pub const ALL: [ChunkType; 38] = [
        Self::DeviceInit,
        Self::SetResourceName,
        Self::ReleaseResource,
        Self::CreateSwapBuffer,
        Self::CaptureScope,
        Self::PushEvent,
        Self::SetMarker,
        Self::PopEvent,
        Self::DebugMessages,
        Self::ContextCaptureHeader,
        Self::ContextCaptureFooter,
        Self::SetShaderDebugPath,
        Self::CreateCommandQueue,
        Self::CreateCommandAllocator,
        Self::CreateCommandList,
        Self::CreateGraphicsPipe,
        Self::CreateComputePipe,
        Self::CreateDescriptorHeap,
        Self::CreateRootSig,
        Self::CreateCommittedResource,
        Self::CreateFence,
        Self::CloseList,
        Self::ResetList,
        Self::ResourceBarrier,
        Self::DrawIndexedInst,
        Self::CopyBuffer,
        Self::ClearRtv,
        Self::SetTopology,
        Self::SetIBuffer,
        Self::SetVBuffers,
        Self::SetViewports,
        Self::SetScissors,
        Self::SetPipe,
        Self::SetRtvs,
        Self::SetGfxRootSig,
        Self::SetGfxRootCbv,
        Self::ExecuteCmdLists,
        Self::Signal,
    ];

    pub fn id(self) -> u32 {
        self as u32
    }

    /// Resolve a wire id. Returns `None` for transport ids, the sentinel, and
    /// ids from newer producers.
    pub fn from_id(id: u32) -> Option<Self> {
        let index = id.checked_sub(FIRST_CHUNK_ID)?;
        Self::ALL.get(index as usize).copied()
    }

    pub fn is_sentinel(self) -> bool {
        self == Self::NumChunks
    }

    /// Display name for inspection. Never used for identity.
    pub fn name(self) -> &'static str {
        match self {
            Self::DeviceInit => "ID3D12Device::Initialisation",
            Self::SetResourceName => "ID3D12Object::SetName",
            Self::ReleaseResource => "IUnknown::Release",
            Self::CreateSwapBuffer => "IDXGISwapChain::GetBuffer",
            Self::CaptureScope => "Capture",
            Self::PushEvent => "BeginEvent",
            Self::SetMarker => "SetMarker",
            Self::PopEvent => "EndEvent",
            Self::DebugMessages => "DebugMessageList",
            Self::ContextCaptureHeader => "ContextBegin",
            Self::ContextCaptureFooter => "ContextEnd",
            Self::SetShaderDebugPath => "SetShaderDebugPath",
            Self::CreateCommandQueue => "ID3D12Device::CreateCommandQueue",
            Self::CreateCommandAllocator => "ID3D12Device::CreateCommandAllocator",
            Self::CreateCommandList => "ID3D12Device::CreateCommandList",
            Self::CreateGraphicsPipe => "ID3D12Device::CreateGraphicsPipeline",
            Self::CreateComputePipe => "ID3D12Device::CreateComputePipeline",
            Self::CreateDescriptorHeap => "ID3D12Device::CreateDescriptorHeap",
            Self::CreateRootSig => "ID3D12Device::CreateRootSignature",
            Self::CreateCommittedResource => "ID3D12Device::CreateCommittedResource",
            Self::CreateFence => "ID3D12Device::CreateFence",
            Self::CloseList => "ID3D12GraphicsCommandList::Close",
            Self::ResetList => "ID3D12GraphicsCommandList::Reset",
            Self::ResourceBarrier => "ID3D12GraphicsCommandList::ResourceBarrier",
            Self::DrawIndexedInst => "ID3D12GraphicsCommandList::DrawIndexedInstanced",
            Self::CopyBuffer => "ID3D12GraphicsCommandList::CopyBufferRegion",
            Self::ClearRtv => "ID3D12GraphicsCommandList::ClearRenderTargetView",
            Self::SetTopology => "ID3D12GraphicsCommandList::IASetPrimitiveTopology",
            Self::SetIBuffer => "ID3D12GraphicsCommandList::IASetIndexBuffer",
            Self::SetVBuffers => "ID3D12GraphicsCommandList::IASetVertexBuffers",
            Self::SetViewports => "ID3D12GraphicsCommandList::RSSetViewports",
            Self::SetScissors => "ID3D12GraphicsCommandList::RSSetScissors",
            Self::SetPipe => "ID3D12GraphicsCommandList::SetPipelineState",
            Self::SetRtvs => "ID3D12GraphicsCommandList::OMSetRenderTargets",
            Self::SetGfxRootSig => "ID3D12GraphicsCommandList::SetGraphicsRootSignature",
            Self::SetGfxRootCbv => {
                "ID3D12GraphicsCommandList::SetGraphicsRootConstantBufferView"
            }
            Self::ExecuteCmdLists => "ID3D12GraphicsCommandQueue::ExecuteCommandLists",
            Self::Signal => "ID3D12GraphicsCommandQueue::Signal",
            Self::NumChunks => "",
        }
    }
}

/// One recorded state-mutating call: a type tag plus its encoded parameters.
///
/// Immutable once built. Only [`Chunk::new`] constructs one, so a chunk tagged
/// with the sentinel can never reach a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    chunk_type: ChunkType,
    payload: Vec<u8>,
}

impl Chunk {
    pub fn new(chunk_type: ChunkType, payload: Vec<u8>) -> Result<Self, CaptureError> {
        if chunk_type.is_sentinel() {
            return Err(CaptureError::InvalidChunkType(chunk_type.id()));
        }
        if u32::try_from(payload.len()).is_err() {
            return Err(CaptureError::PayloadTooLarge {
                size: payload.len(),
                limit: u32::MAX,
            });
        }
        Ok(Self {
            chunk_type,
            payload,
        })
    }

    pub fn chunk_type(&self) -> ChunkType {
        self.chunk_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_len(&self) -> u32 {
        // Checked in `new`.
        self.payload.len() as u32
    }
}
