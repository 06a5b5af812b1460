//! # gpu-capture-windows
//!
//! Windows COM bridge for gpu-capture-core.
//!
//! Provides:
//! - `ComObject`: any Direct3D 12 interface pointer as a core `RealObject`
//!
//! ## Platform Requirements
//! - Windows 10 with the Direct3D 12 runtime
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use gpu_capture_windows::ComObject;
//!
//! let fence: ID3D12Fence = unsafe { device.CreateFence(0, D3D12_FENCE_FLAG_NONE)? };
//! let real = ComObject::from_interface(&fence)?;
//! real.set_name("frame fence")?;
//! ```

#[cfg(target_os = "windows")]
pub mod com_object;

#[cfg(target_os = "windows")]
pub use com_object::ComObject;
