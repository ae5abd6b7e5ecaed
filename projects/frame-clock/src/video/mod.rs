pub mod boundary;
pub mod opencv_reader;
pub mod transcode;

use anyhow::Result;
use opencv::core::Mat;

pub trait VideoReader: Send {
    fn frame_count(&self) -> Result<usize>;
    fn source_fps(&self) -> Result<f64>;
    fn seek_to_frame(&mut self, frame_num: usize) -> Result<()>;
    fn read_frame(&mut self) -> Result<Mat>;
}
