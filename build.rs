//! Build script for stackcache
//!
//! Windows: embeds an application manifest enabling long path support, so
//! deeply nested stack directories (vendored modules, provider caches) can
//! be fingerprinted past the 260 character MAX_PATH limit.
//!
//! On other platforms the script does nothing.

fn main() {
    #[cfg(windows)]
    {
        embed_resource::compile("stackcache.rc", embed_resource::NONE);

        println!("cargo:rerun-if-changed=stackcache.rc");
        println!("cargo:rerun-if-changed=stackcache.manifest");
    }
}
