//! CARv1 framing for block tree responses.

use hs_types::{Block, ContentId};
use iroh_car::{CarHeader, CarReader, CarWriter};

use crate::error::{ServerError, ServerResult};

pub const CAR_CONTENT_TYPE: &str = "application/vnd.ipld.car; version=1";

/// Encode `blocks`, in order, as a CARv1 archive rooted at `root`.
pub async fn write_car(root: &ContentId, blocks: &[Block]) -> ServerResult<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut writer = CarWriter::new(CarHeader::new_v1(vec![*root.as_cid()]), &mut buf);
        for block in blocks {
            writer
                .write(*block.cid().as_cid(), block.bytes())
                .await
                .map_err(car_error)?;
        }
        writer.finish().await.map_err(car_error)?;
    }
    Ok(buf)
}

/// A decoded CARv1 archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Car {
    pub roots: Vec<ContentId>,
    pub blocks: Vec<Block>,
}

/// Parse a CARv1 archive. Block bytes are not verified; callers check them
/// against their CIDs.
pub async fn read_car(data: &[u8]) -> ServerResult<Car> {
    let mut reader = CarReader::new(data).await.map_err(car_error)?;
    let roots = reader
        .header()
        .roots()
        .iter()
        .map(|cid| ContentId::try_from(*cid))
        .collect::<Result<Vec<_>, _>>()
        .map_err(car_error)?;

    let mut blocks = Vec::new();
    while let Some((cid, bytes)) = reader.next_block().await.map_err(car_error)? {
        let cid = ContentId::try_from(cid).map_err(car_error)?;
        blocks.push(Block::new(cid, bytes));
    }
    Ok(Car { roots, blocks })
}

fn car_error(err: impl std::fmt::Display) -> ServerError {
    ServerError::Car(err.to_string())
}
