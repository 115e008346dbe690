use crate::error::{IoError, IoOperation, IoResult};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::ErrorKind;
use std::mem::MaybeUninit;
use std::net::{Ipv4Addr, SocketAddrV4};

/// Send and receive raw ICMP datagrams.
pub trait IcmpChannel {
    /// Send an ICMP message to `addr`, returning the number of bytes written.
    fn send_to(&mut self, buf: &[u8], addr: Ipv4Addr) -> IoResult<usize>;

    /// Receive a datagram, including its IP header, without blocking.
    ///
    /// Returns `Ok(None)` if nothing is waiting.
    fn try_recv_from(&mut self, buf: &mut [u8]) -> IoResult<Option<(usize, Ipv4Addr)>>;
}

/// A raw `IPPROTO_ICMP` socket.
pub struct RawSocket {
    inner: Socket,
}

impl RawSocket {
    /// Open a raw ICMP socket sending with the given IP time-to-live.
    pub fn open(ttl: u8) -> IoResult<Self> {
        let inner = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))
            .map_err(|err| IoError::Other(err, IoOperation::NewSocket))?;
        inner
            .set_ttl(u32::from(ttl))
            .map_err(|err| IoError::Other(err, IoOperation::SetTtl))?;
        Ok(Self { inner })
    }
}

impl IcmpChannel for RawSocket {
    #[tracing::instrument(skip(self, buf), level = "trace")]
    fn send_to(&mut self, buf: &[u8], addr: Ipv4Addr) -> IoResult<usize> {
        let dest = SockAddr::from(SocketAddrV4::new(addr, 0));
        self.inner
            .send_to(buf, &dest)
            .map_err(|err| IoError::SendTo(err, addr))
    }

    fn try_recv_from(&mut self, buf: &mut [u8]) -> IoResult<Option<(usize, Ipv4Addr)>> {
        // Safety: `recv_from_with_flags` never writes uninitialised bytes into the buffer,
        // so viewing initialised memory as `MaybeUninit` is sound.
        #[allow(unsafe_code)]
        let uninit = unsafe { &mut *(std::ptr::from_mut::<[u8]>(buf) as *mut [MaybeUninit<u8>]) };
        match self.inner.recv_from_with_flags(uninit, libc::MSG_DONTWAIT) {
            Ok((bytes_read, addr)) => {
                let source = addr
                    .as_socket_ipv4()
                    .map_or(Ipv4Addr::UNSPECIFIED, |addr| *addr.ip());
                tracing::trace!(bytes_read, %source, "datagram received");
                Ok(Some((bytes_read, source)))
            }
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Ok(None)
            }
            Err(err) => Err(IoError::Other(err, IoOperation::RecvFrom)),
        }
    }
}
