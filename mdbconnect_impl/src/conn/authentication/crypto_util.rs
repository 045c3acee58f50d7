use crate::MdbResult;
use crypto_common::{KeyInit, OutputSizeUser};
use ::hmac::{
    digest::{FixedOutput, Update},
    Mac,
};
use md5::Md5;
use pbkdf2::pbkdf2;
use sha2::Digest;

// PBKDF2 with the given MAC as pseudo-random function; the output is as long as one MAC.
pub(crate) fn salted_password<M>(password: &[u8], salt: &[u8], iterations: u32) -> MdbResult<Vec<u8>>
where
    M: Mac + KeyInit + Update + FixedOutput + Clone + Sync,
{
    let mut output = vec![0_u8; <M as OutputSizeUser>::output_size()];
    pbkdf2::<M>(password, salt, iterations, &mut output)?;
    Ok(output)
}

pub(crate) fn hmac<M>(key: &[u8], data: &[u8]) -> MdbResult<Vec<u8>>
where
    M: Mac + KeyInit,
{
    let mut mac = <M as Mac>::new_from_slice(key)?;
    Mac::update(&mut mac, data);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub(crate) fn digest<D: Digest>(input: &[u8]) -> Vec<u8> {
    D::digest(input).to_vec()
}

pub(crate) fn md5_hex(input: &[u8]) -> String {
    hex::encode(Md5::digest(input))
}

pub(crate) fn xor(a: &[u8], b: &[u8]) -> MdbResult<Vec<u8>> {
    if a.len() == b.len() {
        Ok(a.iter().zip(b).map(|(x, y)| x ^ y).collect())
    } else {
        Err(impl_err!(
            "xor needs two equally long parameters, got {} and {}",
            a.len(),
            b.len()
        ))
    }
}

// Comparison that does not stop at the first difference.
pub(crate) fn equal_in_constant_time(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod test {
    use super::{digest, equal_in_constant_time, hmac, md5_hex, xor};
    use ::hmac::Hmac;
    use sha1::Sha1;
    use sha2::Sha256;

    #[test]
    fn test_helpers() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            hex::encode(digest::<Sha1>(b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(digest::<Sha256>(b"abc").len(), 32);
        assert_eq!(hmac::<Hmac<Sha1>>(b"key", b"data").unwrap().len(), 20);
        assert_eq!(hmac::<Hmac<Sha256>>(b"key", b"data").unwrap().len(), 32);
        assert_eq!(xor(&[0b1100], &[0b1010]).unwrap(), vec![0b0110]);
        assert!(xor(&[1, 2], &[1]).is_err());
        assert!(equal_in_constant_time(b"abc", b"abc"));
        assert!(!equal_in_constant_time(b"abc", b"abd"));
        assert!(!equal_in_constant_time(b"abc", b"ab"));
    }
}
