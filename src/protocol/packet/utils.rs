/// INTERNAL
/// Used to generate the packet registry enums
/// that the session layer matches on
/// to encode and decode packets by ID byte.
macro_rules! define_raknet_packets {
    (
        $(#[$meta:meta])*
        pub enum $registry:ident {
            $(
                $name:ident,
            )+
        }
    ) => {
        $(#[$meta])*
        pub enum $registry {
            $(
                $name($name),
            )+
        }

        impl $registry {
            pub fn decode(src: &mut impl Buf) -> Result<Self, DecodeError> {
                if !src.has_remaining() {
                    return Err(DecodeError::UnexpectedEof);
                }
                let id = src.get_u8();
                Ok(match id {
                    $(
                        <$name as Packet>::ID => {
                            $registry::$name(<$name as Packet>::decode_body(src)?)
                        }
                    )+
                    other => return Err(DecodeError::UnknownId(other)),
                })
            }

            pub fn id(&self) -> u8 {
                match self {
                    $(
                        $registry::$name(_inner) => <$name as Packet>::ID,
                    )+
                }
            }

            pub fn encode(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
                dst.put_u8(self.id());
                match self {
                    $(
                        $registry::$name(inner) => inner.encode_body(dst),
                    )+
                }
            }
        }

        $(
            impl From<$name> for $registry {
                fn from(packet: $name) -> Self {
                    $registry::$name(packet)
                }
            }
        )+
    }
}
pub(crate) use define_raknet_packets;
