// PNGチャンク用CRC32 (IEEE 802.3, 反転多項式 0xEDB88320)

/// 反転表現のCRC32多項式。
const POLYNOMIAL: u32 = 0xEDB8_8320;

/// コンパイル時に生成するバイト単位のルックアップテーブル。
const TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { POLYNOMIAL ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

/// 逐次更新可能なCRC32計算器。
///
/// PNGではチャンク種別とペイロードを連結した列に対して計算するため、
/// 連結バッファを作らずに `update` を2回呼べるようにしている。
#[derive(Debug, Clone, Copy)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    pub fn new() -> Self {
        Self { state: 0xFFFF_FFFF }
    }

    pub fn update(&mut self, data: &[u8]) {
        let mut c = self.state;
        for &b in data {
            c = TABLE[((c ^ u32::from(b)) & 0xFF) as usize] ^ (c >> 8);
        }
        self.state = c;
    }

    pub fn finalize(self) -> u32 {
        self.state ^ 0xFFFF_FFFF
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// バイト列全体のCRC32を返す。
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(data);
    crc.finalize()
}

/// PNGチャンクのCRC（チャンク種別 + ペイロード）を返す。
pub fn chunk_crc(chunk_type: &[u8; 4], payload: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(chunk_type);
    crc.update(payload);
    crc.finalize()
}
