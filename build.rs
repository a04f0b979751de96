use vergen::EmitBuilder;

fn main() {
    // 生成构建信息，供 `aria2ctl --version` 显示构建时间与提交
    if let Err(e) = EmitBuilder::builder()
        .build_timestamp()
        .git_sha(true)
        .emit()
    {
        println!("cargo:warning=无法生成构建信息: {}", e);
        println!("cargo:rustc-env=VERGEN_BUILD_TIMESTAMP=unknown");
        println!("cargo:rustc-env=VERGEN_GIT_SHA=unknown");
    }
}
