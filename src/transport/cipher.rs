//! # Cipher Stream
//!
//! Transparent AES-128-CFB8 over any tokio byte stream.
//!
//! CFB8 feeds back one byte at a time, so it behaves like a stream cipher: no
//! padding, any write size, and the ciphertext has the same length as the plaintext.
//! The key is the 16-byte shared secret from login and the IV is sixteen zero bytes.
//! Encryption and decryption keep separate running state.
//!
//! ## Ownership
//! [`CipherStream`] owns whatever it wraps. To keep the underlying stream, wrap a
//! `&mut S` instead of `S`, or take it back with [`CipherStream::into_inner`].
//!
//! ## Write buffering
//! Bytes handed to `poll_write` are encrypted once and kept until the inner writer has
//! accepted them, so the keystream never runs ahead of what actually reached the wire.
//! Call `flush` to push them out.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use cfb8::cipher::generic_array::GenericArray;
use cfb8::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::error::CryptoError;

type Aes128Cfb8Enc = cfb8::Encryptor<aes::Aes128>;
type Aes128Cfb8Dec = cfb8::Decryptor<aes::Aes128>;

/// AES-128 key length in bytes.
pub const KEY_LEN: usize = 16;

const ZERO_IV: [u8; 16] = [0u8; 16];

/// Running CFB8 state for both directions.
pub struct CipherState {
    encryptor: Aes128Cfb8Enc,
    decryptor: Aes128Cfb8Dec,
}

impl CipherState {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != KEY_LEN {
            return Err(CryptoError::InvalidKeyLength(key.len()));
        }
        let encryptor = Aes128Cfb8Enc::new_from_slices(key, &ZERO_IV)
            .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
        let decryptor = Aes128Cfb8Dec::new_from_slices(key, &ZERO_IV)
            .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
        Ok(Self {
            encryptor,
            decryptor,
        })
    }

    pub fn encrypt(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            self.encryptor
                .encrypt_block_mut(GenericArray::from_mut_slice(std::slice::from_mut(byte)));
        }
    }

    pub fn decrypt(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            self.decryptor
                .decrypt_block_mut(GenericArray::from_mut_slice(std::slice::from_mut(byte)));
        }
    }
}

impl fmt::Debug for CipherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CipherState { .. }")
    }
}

/// Duplex stream wrapper that encrypts writes and decrypts reads.
pub struct CipherStream<S> {
    inner: S,
    state: CipherState,
    pending: Vec<u8>,
    pending_pos: usize,
}

impl<S> CipherStream<S> {
    pub fn new(inner: S, key: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            inner,
            state: CipherState::new(key)?,
            pending: Vec::new(),
            pending_pos: 0,
        })
    }

    /// Drops the cipher state and returns the wrapped stream.
    ///
    /// Encrypted bytes not yet flushed are discarded.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Ciphertext bytes waiting for the inner writer.
    pub fn pending_len(&self) -> usize {
        self.pending.len() - self.pending_pos
    }
}

impl<S: AsyncWrite + Unpin> CipherStream<S> {
    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while self.pending_pos < self.pending.len() {
            let unsent = &self.pending[self.pending_pos..];
            let written = ready!(Pin::new(&mut self.inner).poll_write(cx, unsent))?;
            if written == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.pending_pos += written;
        }
        self.pending.clear();
        self.pending_pos = 0;
        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for CipherStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let already_filled = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        this.state.decrypt(&mut buf.filled_mut()[already_filled..]);
        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for CipherStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;

        this.pending.extend_from_slice(buf);
        this.state.encrypt(&mut this.pending);

        // Best effort; whatever is left goes out on the next write or flush.
        if let Poll::Ready(Err(e)) = this.poll_drain(cx) {
            return Poll::Ready(Err(e));
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}

impl<S> fmt::Debug for CipherStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherStream")
            .field("pending", &self.pending_len())
            .finish_non_exhaustive()
    }
}
