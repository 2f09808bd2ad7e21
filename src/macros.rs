#[macro_export]
macro_rules! make_smart_pointer {
    ($name:ident<$($gen:ident),+>, $target:ty => $field:ident) => {
        impl<$($gen),+> std::ops::Deref for $name<$($gen),+> {
            type Target = $target;
            fn deref(&self) -> &Self::Target {
                &self.$field
            }
        }
        impl<$($gen),+> std::ops::DerefMut for $name<$($gen),+> {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.$field
            }
        }
    };
}

#[macro_export]
macro_rules! env_var {
    (
        defaults: {
            $($name:ident : $type:ty = $default:expr),* $(,)?
        },
        optional: {
            $($opt_name:ident),* $(,)?
        }
    ) => {
        $(
            let mut $name: $type = $default;
        )*

        $(
            let mut $opt_name: Option<String> = std::env::var(stringify!($opt_name)).ok();
        )*

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                $(
                    concat!("--", stringify!($name)) => {
                        if let Some(val) = args.next() {
                            $name = val.parse::<$type>().expect("Failed to parse argument");
                        }
                    }
                )*
                $(
                    concat!("--", stringify!($opt_name)) => {
                        if let Some(val) = args.next() {
                            $opt_name = Some(val);
                        }
                    }
                )*
                _ => eprintln!("Unexpected argument: {}", arg),
            }
        }
    };
}
