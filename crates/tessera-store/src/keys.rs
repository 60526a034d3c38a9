//! Key layout. Integers are big-endian with the sign bit flipped so byte order matches
//! numeric order, which keeps each chunk's blocks contiguous under a prefix scan.

use tessera_world::{BlockCoord, ChunkCoord};

pub const BLOCK_NS: u8 = b'b';
pub const VERSION_NS: u8 = b'c';
pub const PLAYER_NS: u8 = b'p';

pub const CHUNK_PREFIX_LEN: usize = 1 + 8;
pub const BLOCK_KEY_LEN: usize = CHUNK_PREFIX_LEN + 12;

#[inline]
fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&((v as u32) ^ 0x8000_0000).to_be_bytes());
}

#[inline]
fn get_i32(b: &[u8]) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&b[..4]);
    (u32::from_be_bytes(raw) ^ 0x8000_0000) as i32
}

pub fn chunk_prefix(c: ChunkCoord) -> Vec<u8> {
    let mut k = Vec::with_capacity(BLOCK_KEY_LEN);
    k.push(BLOCK_NS);
    put_i32(&mut k, c.cx);
    put_i32(&mut k, c.cz);
    k
}

pub fn block_key(b: BlockCoord) -> Vec<u8> {
    let mut k = chunk_prefix(b.chunk());
    put_i32(&mut k, b.x);
    put_i32(&mut k, b.y);
    put_i32(&mut k, b.z);
    k
}

pub fn decode_block_key(k: &[u8]) -> Option<BlockCoord> {
    if k.len() != BLOCK_KEY_LEN || k[0] != BLOCK_NS {
        return None;
    }
    let body = &k[CHUNK_PREFIX_LEN..];
    Some(BlockCoord::new(
        get_i32(&body[0..4]),
        get_i32(&body[4..8]),
        get_i32(&body[8..12]),
    ))
}

pub fn version_key(c: ChunkCoord) -> Vec<u8> {
    let mut k = Vec::with_capacity(CHUNK_PREFIX_LEN);
    k.push(VERSION_NS);
    put_i32(&mut k, c.cx);
    put_i32(&mut k, c.cz);
    k
}

pub fn player_key() -> Vec<u8> {
    vec![PLAYER_NS]
}
